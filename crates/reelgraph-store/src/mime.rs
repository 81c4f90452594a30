// crates/reelgraph-store/src/mime.rs
// ============================================================================
// Module: Reelgraph MIME Extension Table
// Description: Fixed MIME type to file extension mapping for blob naming.
// Purpose: Give blobs a human-inspectable extension without relying on
//          content sniffing.
// ============================================================================

//! ## Overview
//! The blob store names files `<hash>.<ext>` when the producer's declared
//! MIME type is in this fixed table, and bare `<hash>` otherwise. The table
//! intentionally does not attempt to cover every MIME type that exists —
//! only the ones this engine's producers are expected to emit.

/// Returns the file extension associated with a MIME type, if any.
#[must_use]
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "audio/mpeg" => Some("mp3"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "application/json" => Some("json"),
        "text/plain" => Some("txt"),
        "text/markdown" => Some("md"),
        "text/srt" | "application/x-subrip" => Some("srt"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mime_types_resolve() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("application/json"), Some("json"));
    }

    #[test]
    fn unknown_mime_type_has_no_extension() {
        assert_eq!(extension_for("application/x-reelgraph-internal"), None);
    }
}
