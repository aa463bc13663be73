use noisecc_core::error::PipelineError;
use noisecc_core::resolver::MetadataResolver;
use noisecc_core::types::ChannelId;

#[test]
fn primary_location_wins() {
    let primary = tempfile::tempdir().unwrap();
    let secondary = tempfile::tempdir().unwrap();
    let identity = ChannelId::new("XX", "AAA", "BHZ");
    std::fs::write(primary.path().join("XX.AAA.BHZ"), b"primary").unwrap();
    std::fs::write(secondary.path().join("XX.AAA.BHZ"), b"secondary").unwrap();

    let resolver = MetadataResolver::new(primary.path(), Some(secondary.path()));
    let resolved = resolver.resolve(&identity).unwrap();
    assert!(resolved.starts_with(primary.path()));
}

#[test]
fn secondary_location_is_searched_on_miss() {
    let primary = tempfile::tempdir().unwrap();
    let secondary = tempfile::tempdir().unwrap();
    let identity = ChannelId::new("XX", "AAA", "BHZ");
    std::fs::write(secondary.path().join("XX.AAA.BHZ"), b"secondary").unwrap();

    let resolver = MetadataResolver::new(primary.path(), Some(secondary.path()));
    let resolved = resolver.resolve(&identity).unwrap();
    assert!(resolved.starts_with(secondary.path()));
}

#[test]
fn missing_everywhere_fails_closed() {
    let primary = tempfile::tempdir().unwrap();
    let resolver = MetadataResolver::new(primary.path(), None);
    let error = resolver
        .resolve(&ChannelId::new("XX", "AAA", "BHZ"))
        .unwrap_err();
    assert!(matches!(error, PipelineError::MetadataNotFound { .. }));
}
