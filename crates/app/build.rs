// Build script for Vulkan shader compilation.
//
// GLSL sources under shaders/ are compiled with glslc from the Vulkan SDK
// into shaders/spirv/, where the renderer loads them at runtime. Compiled
// output keeps the full source name (mesh.vert -> mesh.vert.spv) so vertex
// and fragment stages of one shader never collide.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    // Without the SDK the prebuilt SPIR-V (if any) is used as is
    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK to compile shaders");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        eprintln!("hint: Ensure the Vulkan SDK is properly installed");
        panic!("Shader compiler not found");
    }

    let shader_dir = PathBuf::from("../../shaders");
    let target_dir = shader_dir.join("spirv");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {:?}: {}", target_dir, e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    let mut compiled_count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .is_some_and(|ext| ext == "vert" || ext == "frag");
        if !is_shader {
            continue;
        }

        println!("cargo:rerun-if-changed={}", path.display());

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let out_file = target_dir.join(format!("{}.spv", file_name));

        if is_up_to_date(&path, &out_file) {
            eprintln!("info: Shader {} is up to date", file_name);
            continue;
        }

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {:?}", file_name, out_file.file_name());
                compiled_count += 1;
            }
            Ok(s) => {
                eprintln!(
                    "error: glslc failed for {:?} with exit code: {}",
                    path,
                    s.code().unwrap_or(-1)
                );
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled_count);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}

fn is_up_to_date(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified());
    match (modified(source), modified(output)) {
        (Ok(src), Ok(out)) => src <= out,
        _ => false,
    }
}
