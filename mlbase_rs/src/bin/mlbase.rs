use std::any::Any;
use std::panic;

use colored::Colorize;
use mlbase::cli::entrypoint::{EntryOptions, run};

fn install_broken_pipe_handler() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let is_broken = <dyn Any>::downcast_ref::<&str>(payload)
            .is_some_and(|s| s.contains("Broken pipe"))
            || <dyn Any>::downcast_ref::<String>(payload)
                .is_some_and(|s| s.contains("Broken pipe"));

        if is_broken {
            // Quietly exit when downstream closes the pipe (e.g. piping to `head`).
            std::process::exit(0);
        }

        default_hook(info);
    }));
}

fn main() {
    install_broken_pipe_handler();

    let code = match run(&EntryOptions {
        binary_name: "mlbase",
        about: "Machine-learning toolbox built from composable commands and plugins",
    }) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "[mlbase][error]".red(), err);
            1
        }
    };
    std::process::exit(code);
}
