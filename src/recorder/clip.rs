//! Finished recording handed to the completion consumer.

/// An encoded voice note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClip {
    /// Complete encoded file contents
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub sample_rate: u32,
    /// Elapsed-seconds counter at the moment of stopping (paused time excluded)
    pub duration_seconds: u64,
}

impl RecordedClip {
    /// File extension matching the mime type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type {
            "audio/wav" => "wav",
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            _ => "bin",
        }
    }

    /// Name used when the clip is attached to a message.
    pub fn file_name(&self) -> String {
        format!("voice-note.{}", self.extension())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_follows_mime_type() {
        let clip = RecordedClip {
            bytes: vec![0; 4],
            mime_type: "audio/wav",
            sample_rate: 16000,
            duration_seconds: 3,
        };
        assert_eq!(clip.file_name(), "voice-note.wav");
        assert_eq!(clip.len(), 4);
    }
}
