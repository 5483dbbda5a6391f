use crate::shell::start_shell;

mod logger;
mod shell;

fn main() {
    logger::init();
    start_shell();
}
