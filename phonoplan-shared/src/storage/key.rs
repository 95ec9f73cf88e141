/// Object key layout for recordings
///
/// ```text
/// org/{orgId}/students/{studentId}/recordings/{timestampMs}_{uuidWithoutHyphens}.{ext}
/// ```
///
/// The `org/{orgId}/` prefix is the only tenant check applied to storage
/// access, so every endpoint that accepts a key from a client runs
/// [`key_belongs_to_org`] before touching storage.

use uuid::Uuid;

use crate::media::AudioMimeType;

/// Prefix shared by every object of an organization
pub fn org_key_prefix(org_id: Uuid) -> String {
    format!("org/{}/", org_id)
}

/// Prefix shared by every recording of a student
pub fn recording_key_prefix(org_id: Uuid, student_id: Uuid) -> String {
    format!("org/{}/students/{}/recordings/", org_id, student_id)
}

/// Builds a recording key from explicit time and id
pub fn recording_storage_key(
    org_id: Uuid,
    student_id: Uuid,
    mime_type: AudioMimeType,
    timestamp_ms: i64,
    unique_id: Uuid,
) -> String {
    format!(
        "{}{}_{}.{}",
        recording_key_prefix(org_id, student_id),
        timestamp_ms,
        unique_id.simple(),
        mime_type.extension()
    )
}

/// Builds a fresh recording key for now
pub fn new_recording_storage_key(org_id: Uuid, student_id: Uuid, mime_type: AudioMimeType) -> String {
    recording_storage_key(
        org_id,
        student_id,
        mime_type,
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4(),
    )
}

/// Whether a client-supplied key lives under the organization's prefix
pub fn key_belongs_to_org(key: &str, org_id: Uuid) -> bool {
    key.starts_with(&org_key_prefix(org_id))
}

/// Whether a key is a valid recording key for this student and MIME type
///
/// Checks the org/student prefix and the (case-insensitive) extension.
pub fn key_matches_recording(key: &str, org_id: Uuid, student_id: Uuid, mime_type: AudioMimeType) -> bool {
    let expected_suffix = format!(".{}", mime_type.extension());

    key.starts_with(&recording_key_prefix(org_id, student_id))
        && key.to_ascii_lowercase().ends_with(&expected_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (
            Uuid::parse_str("2b1f7c0e-4a57-4e0a-9d6c-1f3f2a8b9c01").unwrap(),
            Uuid::parse_str("9c8d7e6f-5a4b-4c3d-8e2f-1a0b9c8d7e6f").unwrap(),
        )
    }

    #[test]
    fn test_recording_storage_key_layout() {
        let (org, student) = ids();
        let unique = Uuid::parse_str("ed9af51a-daae-4cbb-ab33-6159c9d9b822").unwrap();

        let key = recording_storage_key(org, student, AudioMimeType::Wav, 1_725_000_000_000, unique);

        assert_eq!(
            key,
            format!(
                "org/{}/students/{}/recordings/1725000000000_ed9af51adaae4cbbab336159c9d9b822.wav",
                org, student
            )
        );
    }

    #[test]
    fn test_extension_follows_mime_type() {
        let (org, student) = ids();
        let key = recording_storage_key(org, student, AudioMimeType::Mpeg, 123, Uuid::nil());
        assert!(key.ends_with("123_00000000000000000000000000000000.mp3"));
    }

    #[test]
    fn test_new_key_matches_recording() {
        let (org, student) = ids();
        let key = new_recording_storage_key(org, student, AudioMimeType::Webm);

        assert!(key_belongs_to_org(&key, org));
        assert!(key_matches_recording(&key, org, student, AudioMimeType::Webm));
        assert!(!key_matches_recording(&key, org, student, AudioMimeType::Mpeg));
    }

    #[test]
    fn test_key_belongs_to_org() {
        let (org, other) = ids();

        assert!(key_belongs_to_org(&format!("org/{}/students/x/recordings/a.webm", org), org));
        assert!(!key_belongs_to_org(&format!("org/{}/students/x/recordings/a.webm", other), org));
        assert!(!key_belongs_to_org(&format!("org/{}", org), org));
        assert!(!key_belongs_to_org(&format!("x/org/{}/a", org), org));
    }

    #[test]
    fn test_key_matches_recording_rejects_mismatches() {
        let (org, student) = ids();
        let prefix = recording_key_prefix(org, student);

        assert!(key_matches_recording(&format!("{}1_a.WEBM", prefix), org, student, AudioMimeType::Webm));
        assert!(!key_matches_recording(&format!("{}1_a.mp3", prefix), org, student, AudioMimeType::Webm));
        assert!(!key_matches_recording(
            &format!("org/{}/students/{}/recordings/1_a.webm", org, Uuid::nil()),
            org,
            student,
            AudioMimeType::Webm
        ));
    }
}
