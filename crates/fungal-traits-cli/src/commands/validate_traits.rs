use anyhow::Result;
use fungal_traits_core::reference::{self, ReferenceError};
use std::path::Path;
use tracing::{error, info};

pub fn run(path: &Path) -> Result<()> {
    info!("Validating FungalTraits table: {}", path.display());

    match reference::validate_fungal_traits(path) {
        Ok(()) => {
            println!("{}: valid FungalTraitsFormat", path.display());
            Ok(())
        }
        Err(ReferenceError::Format(message)) => {
            error!("{} is not a FungalTraits table", path.display());
            println!("{message}");
            anyhow::bail!("validation failed for {}", path.display())
        }
        Err(e) => Err(e.into()),
    }
}
