use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        RenderError::malformed("x")
            .to_string()
            .contains("malformed input:")
    );
    assert!(
        RenderError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        RenderError::external("x")
            .to_string()
            .contains("external tool error:")
    );
    assert!(
        RenderError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("disk full");
    let err = RenderError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("disk full"));
}
