use std::env;
use std::path::PathBuf;

// ffmpeg-sys-next finds FFmpeg through pkg-config everywhere except Windows,
// where a vcpkg install has to be pointed at explicitly.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows"
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=video-frame-extractor: set FFMPEG_DIR (or VCPKG_ROOT with an FFmpeg vcpkg install) to build on Windows."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let installed = PathBuf::from(vcpkg_root).join("installed").join(triplet);

    if !installed.exists() {
        println!(
            "cargo:warning=video-frame-extractor: no FFmpeg found under {}.",
            installed.display()
        );
        return;
    }

    println!(
        "cargo:warning=video-frame-extractor: using vcpkg FFmpeg at {0}; export FFMPEG_DIR={0} to silence this.",
        installed.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=video-frame-extractor: VCPKGRS_DYNAMIC=1 is needed for dynamic vcpkg builds.");
    }
}
