fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Nix-style builds have no .git directory, so the hash can be injected instead
    println!("cargo:rerun-if-env-changed=AUTOFIX_GIT_HASH");
    if let Ok(hash) = std::env::var("AUTOFIX_GIT_HASH") {
        println!("cargo:rustc-env=AUTOFIX_GIT_HASH={}", hash);
    }
}
