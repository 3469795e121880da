fn main() {
    // Node addon link flags; plain rlib builds need nothing.
    if std::env::var_os("CARGO_FEATURE_NAPI").is_some() {
        napi_build::setup();
    }
}
