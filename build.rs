use std::env;

fn main() {
    println!("cargo:rerun-if-changed=kernels");
    println!("cargo:rerun-if-env-changed=ROCM_PATH");
    println!("cargo:rerun-if-env-changed=HIPCC");
    println!("cargo:rerun-if-env-changed=ROCm_ARCH");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_ROCM");

    // Host-only builds never touch the ROCm libraries
    if env::var_os("CARGO_FEATURE_ROCM").is_none() {
        return;
    }

    let rocm_root = env::var("ROCM_PATH").unwrap_or_else(|_| "/opt/rocm".to_string());
    println!("cargo:rustc-link-search=native={}/lib", rocm_root);
    println!("cargo:rustc-link-lib=dylib=amdhip64");
    println!("cargo:rustc-link-lib=dylib=hipblas");
    println!("cargo:rustc-link-lib=dylib=hipsolver");
    println!("cargo:rustc-link-lib=dylib=hipfft");
    println!("cargo:rustc-link-lib=dylib=hiptensor");

    compile_hip_kernels(&rocm_root);
}

fn compile_hip_kernels(rocm_root: &str) {
    use std::path::{Path, PathBuf};
    use std::process::Command;

    let hipcc = env::var("HIPCC").unwrap_or_else(|_| format!("{}/bin/hipcc", rocm_root));
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    if !Path::new(&hipcc).exists() {
        println!(
            "cargo:warning=hipcc not found at {}. Skipping kernel compilation.",
            hipcc
        );
        return;
    }

    // Comma-separated list, e.g. "gfx90a,gfx1100"
    let target_archs = env::var("ROCm_ARCH").unwrap_or_else(|_| "gfx90a,gfx942,gfx1100".to_string());

    // (source_file, env_var_name, code_object)
    let kernels = [("kernels/reduce.hip", "REDUCE_HSACO", "reduce")];

    for (src_file, env_name, object_name) in &kernels {
        if !Path::new(src_file).exists() {
            println!("cargo:warning=Kernel source not found: {}", src_file);
            continue;
        }

        let hsaco_path = out_dir.join(format!("{}.hsaco", object_name));
        let mut command = Command::new(&hipcc);
        command.arg("-c").arg("--genco").arg("-O3");
        for arch in target_archs.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            command.arg(format!("--offload-arch={}", arch));
        }
        let status = command.arg(src_file).arg("-o").arg(&hsaco_path).status();

        match status {
            Ok(status_code) if status_code.success() => {
                println!("cargo:rustc-env={}={}", env_name, hsaco_path.display());
            }
            Ok(status_code) => {
                println!(
                    "cargo:warning=Failed to compile {}: exit code {:?}",
                    src_file,
                    status_code.code()
                );
            }
            Err(e) => {
                println!(
                    "cargo:warning=Failed to execute hipcc for {}: {:?}",
                    src_file, e
                );
            }
        }
    }
}
