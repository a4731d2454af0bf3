use std::process::Command;

fn main() {
    let built = jiff::Timestamp::now();
    println!(
        "cargo:rustc-env=SPINEL_BUILD_TIMESTAMP={}",
        built.strftime("%Y-%m-%d %H:%M:%S UTC")
    );

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let compiler = Command::new(&rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|version| version.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=SPINEL_RUSTC_VERSION={compiler}");
}
