// build.rs
// Pre-build step: compile GLSL shader sources to SPIR-V with glslc

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &str) {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {shader_dir:?}");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension() else {
            continue;
        };
        if ext != "vert" && ext != "frag" {
            continue;
        }

        // simple.vert -> simple.vert.spv; stems alone would collide
        let file_name = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => continue,
        };
        let mut out_name = file_name.clone();
        out_name.push(".spv");
        let out_file = target_dir.join(out_name);

        let up_to_date = matches!(
            (std::fs::metadata(&path), std::fs::metadata(&out_file)),
            (Ok(src), Ok(dst))
                if matches!((src.modified(), dst.modified()), (Ok(s), Ok(d)) if s <= d)
        );
        if up_to_date {
            eprintln!("info: Shader {file_name:?} is up to date");
            continue;
        }

        let status = Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {file_name:?} -> {out_file:?}");
            }
            Ok(s) => {
                eprintln!(
                    "error: glslc failed for {path:?} with exit code: {}",
                    s.code().unwrap_or(-1)
                );
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {path:?}: {e}");
                panic!("Failed to execute shader compiler");
            }
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK to compile shaders");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{vulkan_sdk}\\Bin\\glslc.exe")
    } else {
        format!("{vulkan_sdk}/bin/glslc")
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {glslc}");
        panic!("Shader compiler not found");
    }

    let shader_dir = PathBuf::from("resources/shaders");
    let target_dir = PathBuf::from("target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create target directory: {e}");
        return;
    }

    compile_shaders(&shader_dir, &target_dir, &glslc);
}
