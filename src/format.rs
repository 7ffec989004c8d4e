//! Quality tiers and their yt-dlp format-selector expressions
//!
//! yt-dlp evaluates a `/`-separated list of alternatives left to right and uses the
//! first one it can satisfy. Every expression built here is ordered from the most
//! specific alternative to the least specific one.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User-facing quality tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FormatId {
    /// Best available video and audio
    Best,
    /// Video capped at 1080 lines
    VideoFullhd,
    /// Video capped at 720 lines
    VideoHd,
    /// Video capped at 480 lines
    VideoSd,
    /// Audio only
    Audio,
}

impl FormatId {
    /// Every recognized tier, best first
    pub const ALL: [FormatId; 5] = [
        FormatId::Best,
        FormatId::VideoFullhd,
        FormatId::VideoHd,
        FormatId::VideoSd,
        FormatId::Audio,
    ];

    /// Parse a wire id such as `"video-hd"`
    pub fn parse(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "best" => Some(FormatId::Best),
            "video-fullhd" => Some(FormatId::VideoFullhd),
            "video-hd" => Some(FormatId::VideoHd),
            "video-sd" => Some(FormatId::VideoSd),
            "audio" => Some(FormatId::Audio),
            _ => None,
        }
    }

    /// Wire id
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::Best => "best",
            FormatId::VideoFullhd => "video-fullhd",
            FormatId::VideoHd => "video-hd",
            FormatId::VideoSd => "video-sd",
            FormatId::Audio => "audio",
        }
    }

    /// Maximum video height, if the tier caps it
    pub fn height_ceiling(&self) -> Option<u32> {
        match self {
            FormatId::VideoFullhd => Some(1080),
            FormatId::VideoHd => Some(720),
            FormatId::VideoSd => Some(480),
            FormatId::Best | FormatId::Audio => None,
        }
    }

    /// Whether the tier excludes video streams
    pub fn is_audio_only(&self) -> bool {
        matches!(self, FormatId::Audio)
    }

    /// Container extension the produced file is expected to carry
    pub fn container(&self) -> &'static str {
        if self.is_audio_only() { "m4a" } else { "mp4" }
    }

    fn label(&self) -> &'static str {
        match self {
            FormatId::Best => "Best quality (video + audio)",
            FormatId::VideoFullhd => "1080p (mp4)",
            FormatId::VideoHd => "720p (mp4)",
            FormatId::VideoSd => "480p (mp4)",
            FormatId::Audio => "Audio only (m4a)",
        }
    }

    fn quality(&self) -> &'static str {
        match self {
            FormatId::Best => "max",
            FormatId::VideoFullhd => "high",
            FormatId::VideoHd => "medium",
            FormatId::VideoSd => "low",
            FormatId::Audio => "-",
        }
    }

    /// Ordered alternatives, most restrictive first
    pub fn alternatives(&self) -> Vec<String> {
        match (self, self.height_ceiling()) {
            (FormatId::Audio, _) => vec!["bestaudio[ext=m4a]".to_string(), "bestaudio".to_string()],
            (_, Some(h)) => vec![
                format!("best[height<={h}][ext=mp4]"),
                format!("best[height<={h}]"),
                format!("bestvideo[height<={h}]+bestaudio"),
                "best".to_string(),
            ],
            (_, None) => vec![
                "best[ext=mp4]".to_string(),
                "bestvideo+bestaudio".to_string(),
                "best".to_string(),
            ],
        }
    }

    /// Format-selector expression handed to yt-dlp
    pub fn expression(&self) -> String {
        self.alternatives().join("/")
    }
}

/// Result of mapping a requested format id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatSelection {
    /// Tier the request resolved to
    pub format: FormatId,
    /// `false` when the requested id was unknown and the default was used
    pub recognized: bool,
    /// Format-selector expression
    pub expression: String,
}

impl FormatSelection {
    /// Extension expected on the produced file
    pub fn container(&self) -> &'static str {
        self.format.container()
    }
}

/// Map a requested format id to a selection; unknown ids fall back to [`FormatId::Best`]
pub fn select_format(format_id: &str) -> FormatSelection {
    match FormatId::parse(format_id) {
        Some(format) => FormatSelection {
            format,
            recognized: true,
            expression: format.expression(),
        },
        None => FormatSelection {
            format: FormatId::Best,
            recognized: false,
            expression: FormatId::Best.expression(),
        },
    }
}

/// Map a requested format id to its format-selector expression
///
/// Total: unknown ids yield the same expression as `"best"`.
pub fn map_format(format_id: &str) -> String {
    select_format(format_id).expression
}

/// Catalog entry describing one recognized format
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    /// Wire id to send as `formatId`
    pub id: FormatId,
    /// Display label
    pub label: String,
    /// Coarse quality class
    pub quality: String,
    /// Produced file contains audio
    pub has_audio: bool,
    /// Produced file contains video
    pub has_video: bool,
    /// Expected container extension
    pub container: String,
    /// Format-selector expression passed to yt-dlp
    pub expression: String,
}

/// All recognized formats
pub fn catalog() -> Vec<FormatInfo> {
    FormatId::ALL
        .iter()
        .map(|f| FormatInfo {
            id: *f,
            label: f.label().to_string(),
            quality: f.quality().to_string(),
            has_audio: true,
            has_video: !f.is_audio_only(),
            container: f.container().to_string(),
            expression: f.expression(),
        })
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn ceiling_of(alternative: &str) -> Option<u32> {
        let start = alternative.find("height<=")? + "height<=".len();
        let digits: String = alternative[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    fn filter_count(alternative: &str) -> usize {
        alternative.matches('[').count()
    }

    #[test]
    fn recognized_ids_produce_well_formed_expressions() {
        for format in FormatId::ALL {
            let expr = map_format(format.as_str());
            assert!(!expr.is_empty());
            for alt in expr.split('/') {
                assert!(!alt.is_empty(), "{expr} has an empty alternative");
                assert_eq!(
                    alt.matches('[').count(),
                    alt.matches(']').count(),
                    "unbalanced filter in {alt}"
                );
            }
        }
    }

    #[test]
    fn alternatives_go_from_most_to_least_restrictive() {
        for format in FormatId::ALL {
            let alts = format.alternatives();
            for pair in alts.windows(2) {
                assert!(
                    filter_count(&pair[0]) >= filter_count(&pair[1]),
                    "{} lists {} before {}",
                    format.as_str(),
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn capped_video_ends_with_unconditional_best() {
        for format in [FormatId::VideoFullhd, FormatId::VideoHd, FormatId::VideoSd] {
            let alts = format.alternatives();
            assert_eq!(alts.last().unwrap(), "best");
            assert!(alts[0].starts_with("best[height<="));
            assert!(alts.iter().any(|a| a.contains('+')), "no merged alternative");
            let ceiling = format.height_ceiling().unwrap();
            for alt in &alts[..alts.len() - 1] {
                assert_eq!(ceiling_of(alt), Some(ceiling));
            }
        }
    }

    #[test]
    fn height_ceilings_strictly_decrease_across_tiers() {
        let ceilings: Vec<u32> = FormatId::ALL
            .iter()
            .filter_map(|f| f.height_ceiling())
            .collect();
        assert_eq!(ceilings, vec![1080, 720, 480]);
        assert!(ceilings.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn audio_never_includes_a_video_alternative() {
        let expr = map_format("audio");
        for alt in expr.split('/') {
            assert!(alt.starts_with("bestaudio"), "{alt} may select video");
            assert!(!alt.contains("video"));
        }
        assert_eq!(FormatId::Audio.container(), "m4a");
    }

    #[test]
    fn unknown_ids_fall_back_to_best() {
        let best = map_format("best");
        for id in ["", "4k", "137+140", "VIDEO-UHD", "🎬"] {
            assert_eq!(map_format(id), best);
            let selection = select_format(id);
            assert!(!selection.recognized);
            assert_eq!(selection.format, FormatId::Best);
        }
        assert_eq!(map_format("nope"), map_format("nope"));
    }

    #[test]
    fn parse_is_case_insensitive_and_round_trips_ids() {
        assert_eq!(FormatId::parse(" Video-HD "), Some(FormatId::VideoHd));
        for format in FormatId::ALL {
            assert_eq!(FormatId::parse(format.as_str()), Some(format));
        }
    }

    #[test]
    fn catalog_lists_every_format() {
        let catalog = catalog();
        assert_eq!(catalog.len(), FormatId::ALL.len());
        let audio = catalog.iter().find(|f| f.id == FormatId::Audio).unwrap();
        assert!(!audio.has_video);
        assert_eq!(audio.container, "m4a");

        let json = serde_json::to_value(&catalog[1]).unwrap();
        assert_eq!(json["id"], "video-fullhd");
        assert_eq!(json["hasVideo"], true);
    }
}
