use fungal_traits_core::plugin::Plugin;

pub fn run() {
    print!("{}", Plugin::fungal_traits().bibtex());
}
