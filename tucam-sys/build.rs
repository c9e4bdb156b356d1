use std::env;
use std::path::PathBuf;

// These helper functions are only used when tucam-sdk feature is enabled
#[allow(dead_code)]
/// Print a boxed error message for visibility in cargo output
fn print_env_error(title: &str, details: &[&str], fixes: &[&str]) {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║ TUCAM BUILD ERROR: {:<46} ║", title);
    eprintln!("╠══════════════════════════════════════════════════════════════════╣");
    for detail in details {
        eprintln!("║ {:<66} ║", detail);
    }
    eprintln!("╠══════════════════════════════════════════════════════════════════╣");
    eprintln!("║ HOW TO FIX:                                                      ║");
    for fix in fixes {
        eprintln!("║   {:<64} ║", fix);
    }
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();
}

#[allow(dead_code)]
/// Check for common TUCAM SDK installation paths
fn find_tucam_sdk() -> Option<PathBuf> {
    let candidates = ["/opt/tucsen/sdk", "/usr/local/tucsen/sdk", "/opt/TUCam"];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join("include").join("TUCamApi.h").exists())
}

#[allow(dead_code)]
/// Check for TUCAM library paths
fn find_tucam_lib() -> Option<PathBuf> {
    let candidates = [
        "/opt/tucsen/lib",
        "/usr/local/lib",
        "/usr/lib",
        "/usr/lib/x86_64-linux-gnu",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join("libTUCam.so").exists())
}

#[allow(dead_code)]
/// Print diagnostic information about the environment
fn print_env_diagnostics() {
    eprintln!();
    eprintln!("=== TUCAM Build Diagnostics ===");
    eprintln!("TUCAM_SDK_DIR: {:?}", env::var("TUCAM_SDK_DIR").ok());
    eprintln!("TUCAM_LIB_DIR: {:?}", env::var("TUCAM_LIB_DIR").ok());
    eprintln!("LIBRARY_PATH: {:?}", env::var("LIBRARY_PATH").ok());

    if let Some(found) = find_tucam_sdk() {
        eprintln!("Auto-detected SDK at: {:?}", found);
    }
    if let Some(found) = find_tucam_lib() {
        eprintln!("Auto-detected lib at: {:?}", found);
    }
    eprintln!("===============================");
    eprintln!();
}

fn main() {
    // Only run bindgen and linking logic if the `tucam-sdk` feature is enabled.
    #[cfg(feature = "tucam-sdk")]
    {
        println!("cargo:rerun-if-env-changed=TUCAM_SDK_DIR");
        println!("cargo:rerun-if-env-changed=TUCAM_LIB_DIR");
        println!("cargo:rerun-if-changed=wrapper.h");

        let sdk_dir = match env::var("TUCAM_SDK_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                if let Some(found) = find_tucam_sdk() {
                    println!(
                        "cargo:warning=TUCAM_SDK_DIR not set, auto-detected: {}",
                        found.display()
                    );
                    found
                } else {
                    print_env_diagnostics();
                    print_env_error(
                        "TUCAM_SDK_DIR not set",
                        &[
                            "The tucam-sdk feature requires the Tucsen SDK.",
                            "This environment variable tells the build where to find headers.",
                        ],
                        &["export TUCAM_SDK_DIR=/opt/tucsen/sdk"],
                    );
                    panic!("TUCAM_SDK_DIR environment variable must be set when `tucam-sdk` feature is enabled.");
                }
            }
        };

        let sdk_include_path = sdk_dir.join("include");

        let sdk_lib_path = match env::var("TUCAM_LIB_DIR") {
            Ok(lib_dir) => PathBuf::from(lib_dir),
            Err(_) => find_tucam_lib().unwrap_or_else(|| sdk_dir.join("lib")),
        };

        if !sdk_include_path.exists() {
            print_env_diagnostics();
            print_env_error(
                "SDK include path not found",
                &[
                    &format!("Expected headers at: {}", sdk_include_path.display()),
                    "TUCamApi.h and TUDefine.h are required for bindgen.",
                ],
                &["Set correct path: export TUCAM_SDK_DIR=/path/to/sdk"],
            );
            panic!(
                "TUCAM SDK include path does not exist: {:?}",
                sdk_include_path
            );
        }

        if !sdk_lib_path.exists() {
            println!(
                "cargo:warning=TUCAM SDK lib path does not exist: {}",
                sdk_lib_path.display()
            );
            println!("cargo:warning=Linker will search LIBRARY_PATH and standard paths");
        }

        let bindings = bindgen::Builder::default()
            .header("wrapper.h")
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .clang_arg(format!("-I{}", sdk_include_path.display()))
            .allowlist_function("TUCAM_.*")
            .allowlist_type("TUCAM_.*")
            .allowlist_type("HDTUCAM")
            // TUCAM enums (TUIDP_*, TUCCM_*, ...) become plain constants so that
            // they can be passed straight to the integer-typed API parameters.
            .default_enum_style(bindgen::EnumVariation::Consts)
            .prepend_enum_name(false)
            .allowlist_var("TUCAMRET_.*")
            .allowlist_var("TUIDP_.*")
            .allowlist_var("TUIDC_.*")
            .allowlist_var("TUIDI_.*")
            .allowlist_var("TUCCM_.*")
            .allowlist_var("TUCTE_.*")
            .allowlist_var("TUCTD_.*")
            .allowlist_var("TUCTS_.*")
            .allowlist_var("TUFRM_.*")
            .generate()
            .expect("Unable to generate bindings");

        let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
        bindings
            .write_to_file(out_path.join("bindings.rs"))
            .expect("Couldn't write bindings!");

        println!("cargo:rustc-link-search=native={}", sdk_lib_path.display());
        println!("cargo:rustc-link-lib=TUCam");
    }
    #[cfg(not(feature = "tucam-sdk"))]
    {
        // Empty bindings so that src/lib.rs compiles without the SDK.
        let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
        std::fs::write(
            out_path.join("bindings.rs"),
            "// Bindings are only generated with the tucam-sdk feature\n",
        )
        .expect("Couldn't write dummy bindings!");
    }
}
