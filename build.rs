use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");

    let package_version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    // Release builds and tagged checkouts show the plain version
    let profile = env::var("PROFILE").unwrap_or_default();
    let tagged = || {
        Command::new("git")
            .args(["describe", "--tags", "--exact-match"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .is_some_and(|tag| tag.trim() == format!("v{package_version}"))
    };
    let display_version = if profile == "release" || tagged() {
        package_version.clone()
    } else {
        format!("{package_version}-dev")
    };

    println!("cargo:rustc-env=APP_VERSION_DISPLAY={display_version}");
}
