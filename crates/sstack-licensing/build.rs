//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "build"
//! ss_type: "source"
//! ss_scope: "build"
//! ss_description: "Emits the build date used as this release's licensing date."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().fail_on_error().build_date().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SSTACK_RELEASE_DATE");
    Ok(())
}
