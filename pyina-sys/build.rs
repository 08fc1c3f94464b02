use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Oldest library version with the MPI-3 calls used by the shim.
const MPI_MIN_VERSION: &str = "3.0";

/// Include/link information for the MPI installation.
struct MpiConfig {
    include_paths: Vec<PathBuf>,
    link_paths: Vec<PathBuf>,
    libs: Vec<String>,
}

fn main() {
    println!("cargo:rerun-if-changed=csrc/pyina.c");
    println!("cargo:rerun-if-changed=csrc/pyina.h");
    println!("cargo:rerun-if-env-changed=MPI_PKG_CONFIG");
    println!("cargo:rerun-if-env-changed=MPICC");
    println!("cargo:rerun-if-env-changed=CRAY_MPICH_DIR");

    // Find libmpi.
    let mpi = find_mpi();

    // Compile the shim.
    let mut build = cc::Build::new();
    build.file("csrc/pyina.c").include("csrc").warnings(true);
    for include_path in &mpi.include_paths {
        build.include(include_path);
    }
    build.compile("pyina_shim");

    // Add proper link paths and names.
    for link_path in &mpi.link_paths {
        println!("cargo:rustc-link-search=native={}", link_path.display());
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", link_path.display());
    }
    for lib in &mpi.libs {
        println!("cargo:rustc-link-lib={}", lib);
    }
}

fn find_mpi() -> MpiConfig {
    if let Ok(name) = env::var("MPI_PKG_CONFIG") {
        if let Ok(config) = probe_pkg_config(&name) {
            return config;
        }
    }

    for name in ["mpich", "ompi", "mpi"] {
        if let Ok(config) = probe_pkg_config(name) {
            return config;
        }
    }

    if let Some(config) = probe_mpicc() {
        return config;
    }

    if let Ok(dir) = env::var("CRAY_MPICH_DIR") {
        return MpiConfig {
            include_paths: vec![PathBuf::from(format!("{}/include", dir))],
            link_paths: vec![PathBuf::from(format!("{}/lib", dir))],
            libs: vec!["mpi".to_string()],
        };
    }

    panic!(
        "failed to find an MPI installation; set MPI_PKG_CONFIG, put mpicc on PATH \
         (or set MPICC), or set CRAY_MPICH_DIR"
    );
}

/// Links are emitted by `main`, so pkg-config only reports the paths.
fn probe_pkg_config(name: &str) -> Result<MpiConfig, pkg_config::Error> {
    let mpi = pkg_config::Config::new()
        .atleast_version(MPI_MIN_VERSION)
        .cargo_metadata(false)
        .probe(name)?;
    Ok(MpiConfig {
        include_paths: mpi.include_paths,
        link_paths: mpi.link_paths,
        libs: mpi.libs,
    })
}

/// Parse the flags printed by `mpicc -show`.
fn probe_mpicc() -> Option<MpiConfig> {
    let mpicc = env::var("MPICC").unwrap_or_else(|_| "mpicc".to_string());
    let output = Command::new(&mpicc).arg("-show").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let mut config = MpiConfig {
        include_paths: vec![],
        link_paths: vec![],
        libs: vec![],
    };
    for part in String::from_utf8_lossy(&output.stdout).split_whitespace() {
        if let Some(path) = part.strip_prefix("-I") {
            config.include_paths.push(PathBuf::from(path));
        } else if let Some(path) = part.strip_prefix("-L") {
            config.link_paths.push(PathBuf::from(path));
        } else if let Some(lib) = part.strip_prefix("-l") {
            config.libs.push(lib.to_string());
        }
    }
    if config.libs.is_empty() {
        config.libs.push("mpi".to_string());
    }
    Some(config)
}
