use std::fs;
use std::path::Path;

use viewer::programs::{COMPOSITE_SHADER, COMPOSITE_UNIFORMS, DEPTH_SHADER, DEPTH_UNIFORMS, SMOOTH_SHADER};
use viewer::uniforms::FilterUniforms;

#[test]
fn validate_all_shaders() {
    let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/shaders");
    assert!(shader_dir.exists(), "Shader directory not found: {:?}", shader_dir);

    let mut errors = Vec::new();
    let mut checked = 0;
    for entry in fs::read_dir(&shader_dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "wgsl") {
            let source = fs::read_to_string(&path).unwrap();
            if let Err(e) = parse_and_validate(&source) {
                errors.push(format!("{:?}:\n{}", path.file_name().unwrap(), e));
            }
            checked += 1;
        }
    }

    assert_eq!(checked, 4, "expected depth, pack, smooth and composite shaders");
    assert!(errors.is_empty(), "Shader validation failed:\n{}", errors.join("\n"));
}

#[test]
fn test_uniform_structs_match_packed_layouts() {
    assert_eq!(uniform_size(DEPTH_SHADER), DEPTH_UNIFORMS.byte_size());
    assert_eq!(uniform_size(COMPOSITE_SHADER), COMPOSITE_UNIFORMS.byte_size());
    assert_eq!(
        uniform_size(SMOOTH_SHADER),
        std::mem::size_of::<FilterUniforms>() as u64
    );
}

fn parse_and_validate(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|e| format!("{e:?}"))?;
    Ok(module)
}

/// Size of the uniform-space global `u`.
fn uniform_size(source: &str) -> u64 {
    let module = parse_and_validate(source).unwrap();
    let (_, global) = module
        .global_variables
        .iter()
        .find(|(_, g)| g.space == naga::AddressSpace::Uniform)
        .expect("shader has no uniform buffer");
    assert_eq!(global.name.as_deref(), Some("u"));
    module.types[global.ty].inner.size(module.to_ctx()) as u64
}
