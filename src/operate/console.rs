/// Where the interpreter's printed lines go.
pub trait Console: Send + Sync {
    fn print_line(&self, line: &str);
}

/// Prints to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Console for Stdout {
    fn print_line(&self, line: &str) {
        println!("{line}");
    }
}
