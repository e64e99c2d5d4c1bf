use clap::CommandFactory;
use clap_complete::{Generator, Shell};
use clap_mangen::Man;
use std::path::{Path, PathBuf};

// Include the CLI definition from the library crate
include!("src/cli/app.rs");

fn write_file(path: &Path, bytes: Vec<u8>) {
    if let Err(e) = std::fs::write(path, bytes) {
        println!("cargo:warning=cannot write {}: {}", path.display(), e);
    }
}

fn main() {
    println!("cargo:rerun-if-changed=src/cli/app.rs");

    let out_dir =
        PathBuf::from(std::env::var("OUT_DIR").unwrap_or_else(|_| "target/man".to_string()));
    let man_dir = out_dir.join("man");
    let completions_dir = out_dir.join("completions");
    for dir in [&man_dir, &completions_dir] {
        if let Err(e) = std::fs::create_dir_all(dir) {
            println!("cargo:warning=cannot create {}: {}", dir.display(), e);
            return;
        }
    }

    let cmd = Cli::command();

    // Main man page, then one per subcommand
    let mut buf = Vec::new();
    if Man::new(cmd.clone()).render(&mut buf).is_ok() {
        write_file(&man_dir.join("pdu.1"), buf);
    }
    for sub in cmd.get_subcommands() {
        let mut buf = Vec::new();
        if Man::new(sub.clone()).render(&mut buf).is_ok() {
            write_file(&man_dir.join(format!("pdu-{}.1", sub.get_name())), buf);
        }
    }

    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
        let mut cmd = Cli::command();
        let mut buf = Vec::new();
        clap_complete::generate(shell, &mut cmd, "pdu", &mut buf);
        write_file(&completions_dir.join(shell.file_name("pdu")), buf);
    }
}
