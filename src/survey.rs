//! Typed answer sets: the six-question quiz and the long survey row.
//!
//! Both variants expose their answers through [`Answers`], keyed by a small
//! field enum, so the identity builder can walk a fixed template without
//! caring which schema it is rendering.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Lookup of a single answer by field key.
///
/// Implementations return the raw value; blank filtering is the builder's job.
pub trait Answers {
    type Key: Copy + 'static;

    fn answer(&self, key: Self::Key) -> Option<&str>;
}

/// Either of the two known questionnaire schemas.
#[derive(Debug, Clone)]
pub enum AnswerSet {
    Quiz(QuizAnswers),
    Survey(Box<SurveyResponse>),
}

impl From<QuizAnswers> for AnswerSet {
    fn from(answers: QuizAnswers) -> Self {
        AnswerSet::Quiz(answers)
    }
}

impl From<SurveyResponse> for AnswerSet {
    fn from(response: SurveyResponse) -> Self {
        AnswerSet::Survey(Box::new(response))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizField {
    Relationship,
    Discovery,
    Preference,
    AiView,
    DeadArtistView,
    Sharing,
}

/// Answers to the user-facing quick quiz.
///
/// Accepts both the descriptive keys and the `q1`..`q6` keys used by the
/// quiz form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswers {
    #[serde(default, alias = "q1")]
    pub relationship: Option<String>,
    #[serde(default, alias = "q2")]
    pub discovery: Option<String>,
    #[serde(default, alias = "q3")]
    pub preference: Option<String>,
    #[serde(default, alias = "q4")]
    pub ai_view: Option<String>,
    #[serde(default, alias = "q5")]
    pub dead_artist_view: Option<String>,
    #[serde(default, alias = "q6")]
    pub sharing: Option<String>,
}

impl QuizAnswers {
    pub fn set(&mut self, key: QuizField, value: String) {
        let slot = match key {
            QuizField::Relationship => &mut self.relationship,
            QuizField::Discovery => &mut self.discovery,
            QuizField::Preference => &mut self.preference,
            QuizField::AiView => &mut self.ai_view,
            QuizField::DeadArtistView => &mut self.dead_artist_view,
            QuizField::Sharing => &mut self.sharing,
        };
        *slot = Some(value);
    }
}

impl Answers for QuizAnswers {
    type Key = QuizField;

    fn answer(&self, key: QuizField) -> Option<&str> {
        match key {
            QuizField::Relationship => self.relationship.as_deref(),
            QuizField::Discovery => self.discovery.as_deref(),
            QuizField::Preference => self.preference.as_deref(),
            QuizField::AiView => self.ai_view.as_deref(),
            QuizField::DeadArtistView => self.dead_artist_view.as_deref(),
            QuizField::Sharing => self.sharing.as_deref(),
        }
    }
}

/// Survey columns. Numbered variants address one cell of a multi-select
/// group or grid (1-based, as in the survey export).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyField {
    Age,
    Gender,
    Province,
    Relationship,
    FirstDiscovery,
    GatewayArtist,
    FormatChange,
    NewMusicDiscovery(u8),
    ListenTime(u8),
    Preference,
    AiSongs,
    DeadArtistVoice,
    Bingo(u8),
    Sharing(u8),
    FriendShares,
    GuiltyPleasure,
    GuiltyPleasureSong,
    ExtractedGenre,
    ExtractedFavouriteBand,
}

/// One row of the cleaned survey export.
///
/// Every answer is optional; empty CSV cells deserialize to `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub participant_id: String,

    #[serde(rename = "Age", default)]
    pub age: Option<String>,
    #[serde(rename = "Gender", default)]
    pub gender: Option<String>,
    #[serde(rename = "Province", default)]
    pub province: Option<String>,

    #[serde(rename = "Q1_Relationship_with_music", default)]
    pub relationship: Option<String>,
    #[serde(rename = "Q2_Discovering_music", default)]
    pub first_discovery: Option<String>,
    #[serde(rename = "Q3_artist_that_pulled_you_in", default)]
    pub gateway_artist: Option<String>,
    #[serde(rename = "Q4_Music_format_changes", default)]
    pub format_change: Option<String>,

    #[serde(rename = "Q7_New_music_discover_1", default)]
    pub discover_1: Option<String>,
    #[serde(rename = "Q7_New_music_discover_2", default)]
    pub discover_2: Option<String>,
    #[serde(rename = "Q7_New_music_discover_3", default)]
    pub discover_3: Option<String>,
    #[serde(rename = "Q7_New_music_discover_4", default)]
    pub discover_4: Option<String>,
    #[serde(rename = "Q7_New_music_discover_5", default)]
    pub discover_5: Option<String>,
    #[serde(rename = "Q7_New_music_discover_6", default)]
    pub discover_6: Option<String>,
    #[serde(rename = "Q7_New_music_discover_7", default)]
    pub discover_7: Option<String>,

    #[serde(rename = "Q8_Music_listen_time_GRID_1", default)]
    pub listen_time_1: Option<String>,
    #[serde(rename = "Q8_Music_listen_time_GRID_2", default)]
    pub listen_time_2: Option<String>,
    #[serde(rename = "Q8_Music_listen_time_GRID_3", default)]
    pub listen_time_3: Option<String>,
    #[serde(rename = "Q8_Music_listen_time_GRID_4", default)]
    pub listen_time_4: Option<String>,
    #[serde(rename = "Q8_Music_listen_time_GRID_5", default)]
    pub listen_time_5: Option<String>,
    #[serde(rename = "Q8_Music_listen_time_GRID_6", default)]
    pub listen_time_6: Option<String>,

    #[serde(rename = "Q9_Music_preference_these_days", default)]
    pub preference: Option<String>,
    #[serde(rename = "Q10_Songs_by_AI", default)]
    pub ai_songs: Option<String>,
    #[serde(rename = "Q11_Use_of_dead_artists_voice_feelings", default)]
    pub dead_artist_voice: Option<String>,

    #[serde(rename = "Q12_Music_bingo_1", default)]
    pub bingo_1: Option<String>,
    #[serde(rename = "Q12_Music_bingo_2", default)]
    pub bingo_2: Option<String>,
    #[serde(rename = "Q12_Music_bingo_3", default)]
    pub bingo_3: Option<String>,
    #[serde(rename = "Q12_Music_bingo_4", default)]
    pub bingo_4: Option<String>,
    #[serde(rename = "Q12_Music_bingo_5", default)]
    pub bingo_5: Option<String>,
    #[serde(rename = "Q12_Music_bingo_6", default)]
    pub bingo_6: Option<String>,
    #[serde(rename = "Q12_Music_bingo_7", default)]
    pub bingo_7: Option<String>,

    #[serde(rename = "Q13_Share_the_music_you_love_1", default)]
    pub share_1: Option<String>,
    #[serde(rename = "Q13_Share_the_music_you_love_2", default)]
    pub share_2: Option<String>,
    #[serde(rename = "Q13_Share_the_music_you_love_3", default)]
    pub share_3: Option<String>,
    #[serde(rename = "Q13_Share_the_music_you_love_4", default)]
    pub share_4: Option<String>,
    #[serde(rename = "Q13_Share_the_music_you_love_5", default)]
    pub share_5: Option<String>,
    #[serde(rename = "Q13_Share_the_music_you_love_6", default)]
    pub share_6: Option<String>,

    #[serde(rename = "Q14_Friend_shares_a_song", default)]
    pub friend_shares: Option<String>,
    #[serde(rename = "Q15_Music_guilty_pleasure", default)]
    pub guilty_pleasure: Option<String>,
    #[serde(rename = "Q16_Music_guilty_pleasure_text_OE", default)]
    pub guilty_pleasure_song: Option<String>,

    #[serde(default)]
    pub extracted_genre: Option<String>,
    #[serde(default)]
    pub extracted_favourite_band: Option<String>,
}

/// Survey columns copied into a corpus record for presenting a match.
const DISPLAY_FIELDS: &[(&str, SurveyField)] = &[
    ("Q1_Relationship_with_music", SurveyField::Relationship),
    ("Q2_Discovering_music", SurveyField::FirstDiscovery),
    ("Q3_artist_that_pulled_you_in", SurveyField::GatewayArtist),
    ("Q4_Music_format_changes", SurveyField::FormatChange),
    ("Q9_Music_preference_these_days", SurveyField::Preference),
    ("Q10_Songs_by_AI", SurveyField::AiSongs),
    ("Q11_Use_of_dead_artists_voice_feelings", SurveyField::DeadArtistVoice),
    ("Age", SurveyField::Age),
    ("Gender", SurveyField::Gender),
    ("Province", SurveyField::Province),
];

impl SurveyResponse {
    /// Demographics and key answers shown next to a match.
    pub fn display_payload(&self) -> BTreeMap<String, String> {
        DISPLAY_FIELDS
            .iter()
            .filter_map(|(name, key)| {
                self.answer(*key)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect()
    }
}

impl Answers for SurveyResponse {
    type Key = SurveyField;

    fn answer(&self, key: SurveyField) -> Option<&str> {
        let value = match key {
            SurveyField::Age => &self.age,
            SurveyField::Gender => &self.gender,
            SurveyField::Province => &self.province,
            SurveyField::Relationship => &self.relationship,
            SurveyField::FirstDiscovery => &self.first_discovery,
            SurveyField::GatewayArtist => &self.gateway_artist,
            SurveyField::FormatChange => &self.format_change,
            SurveyField::NewMusicDiscovery(n) => match n {
                1 => &self.discover_1,
                2 => &self.discover_2,
                3 => &self.discover_3,
                4 => &self.discover_4,
                5 => &self.discover_5,
                6 => &self.discover_6,
                7 => &self.discover_7,
                _ => return None,
            },
            SurveyField::ListenTime(n) => match n {
                1 => &self.listen_time_1,
                2 => &self.listen_time_2,
                3 => &self.listen_time_3,
                4 => &self.listen_time_4,
                5 => &self.listen_time_5,
                6 => &self.listen_time_6,
                _ => return None,
            },
            SurveyField::Preference => &self.preference,
            SurveyField::AiSongs => &self.ai_songs,
            SurveyField::DeadArtistVoice => &self.dead_artist_voice,
            SurveyField::Bingo(n) => match n {
                1 => &self.bingo_1,
                2 => &self.bingo_2,
                3 => &self.bingo_3,
                4 => &self.bingo_4,
                5 => &self.bingo_5,
                6 => &self.bingo_6,
                7 => &self.bingo_7,
                _ => return None,
            },
            SurveyField::Sharing(n) => match n {
                1 => &self.share_1,
                2 => &self.share_2,
                3 => &self.share_3,
                4 => &self.share_4,
                5 => &self.share_5,
                6 => &self.share_6,
                _ => return None,
            },
            SurveyField::FriendShares => &self.friend_shares,
            SurveyField::GuiltyPleasure => &self.guilty_pleasure,
            SurveyField::GuiltyPleasureSong => &self.guilty_pleasure_song,
            SurveyField::ExtractedGenre => &self.extracted_genre,
            SurveyField::ExtractedFavouriteBand => &self.extracted_favourite_band,
        };
        value.as_deref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("failed to open survey file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed survey row at line {line}: {source}")]
    Row { line: u64, source: csv::Error },

    #[error("survey row at line {line} has no participant_id")]
    MissingParticipantId { line: u64 },
}

/// Load the cleaned survey export.
///
/// Unknown columns are ignored; a row without a participant id is rejected.
pub fn load_survey_csv(path: &Path) -> Result<Vec<SurveyResponse>, SurveyError> {
    let file = std::fs::File::open(path)?;
    read_survey(file)
}

pub fn read_survey<R: std::io::Read>(reader: R) -> Result<Vec<SurveyResponse>, SurveyError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let row_error = |source: csv::Error| SurveyError::Row {
        line: source.position().map(|p| p.line()).unwrap_or_default(),
        source,
    };

    let headers = reader.headers().map_err(row_error)?.clone();
    let mut record = csv::StringRecord::new();
    let mut responses = Vec::new();

    while reader.read_record(&mut record).map_err(row_error)? {
        // first physical line of the record; quoted fields may span several
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let response: SurveyResponse = record
            .deserialize(Some(&headers))
            .map_err(|source| SurveyError::Row { line, source })?;

        if response.participant_id.trim().is_empty() {
            return Err(SurveyError::MissingParticipantId { line });
        }

        responses.push(response);
    }

    log::debug!("loaded {} survey rows", responses.len());
    Ok(responses)
}
