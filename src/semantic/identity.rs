//! Identity string rendering.
//!
//! Turns an answer set into the text block that gets embedded:
//! 1. Walk a fixed template in order
//! 2. Render each present, non-blank answer as `<label>: <value>`
//! 3. Collapse flag groups into one comma-joined line
//! 4. Skip anything absent without leaving a placeholder
//!
//! Quiz and survey templates share labels so both sides of a match land in
//! the same region of the embedding space.

use crate::survey::{AnswerSet, Answers, QuizField, SurveyField};

/// One line of a template.
pub enum Line<K: 'static> {
    /// A single answer rendered as `<label>: <value>`.
    Field { label: &'static str, key: K },
    /// A group of flags rendered as `<label>: a, b, c` when any flag is set.
    Aggregate {
        label: &'static str,
        flags: &'static [Flag<K>],
    },
    /// A flag that replaces another line with fixed text when set.
    OptOut {
        key: K,
        text: &'static str,
        otherwise: &'static Line<K>,
    },
}

/// A sub-field contributing `phrase` to an aggregate line.
pub struct Flag<K: 'static> {
    pub key: K,
    pub phrase: &'static str,
    pub accepts: Accept,
}

/// Which values switch a flag on.
pub enum Accept {
    /// Any non-blank value.
    Present,
    /// Only these values (exact match after trimming).
    OneOf(&'static [&'static str]),
}

impl Accept {
    fn matches(&self, value: &str) -> bool {
        match self {
            Accept::Present => true,
            Accept::OneOf(allowed) => allowed.contains(&value),
        }
    }
}

const fn flag<K: 'static>(key: K, phrase: &'static str) -> Flag<K> {
    Flag {
        key,
        phrase,
        accepts: Accept::Present,
    }
}

const FREQUENT: Accept = Accept::OneOf(&["Often", "Always"]);

pub const QUIZ_TEMPLATE: &[Line<QuizField>] = &[
    Line::Field {
        label: "Music relationship",
        key: QuizField::Relationship,
    },
    Line::Field {
        label: "First discovered music through",
        key: QuizField::Discovery,
    },
    Line::Field {
        label: "Current music preference",
        key: QuizField::Preference,
    },
    Line::Field {
        label: "View on AI-generated music",
        key: QuizField::AiView,
    },
    Line::Field {
        label: "View on AI using dead artists' voices",
        key: QuizField::DeadArtistView,
    },
    Line::Field {
        label: "Music sharing behavior",
        key: QuizField::Sharing,
    },
];

pub const SURVEY_TEMPLATE: &[Line<SurveyField>] = &[
    Line::Field {
        label: "Music relationship",
        key: SurveyField::Relationship,
    },
    Line::Field {
        label: "First discovered music through",
        key: SurveyField::FirstDiscovery,
    },
    Line::Field {
        label: "First artist that pulled them in",
        key: SurveyField::GatewayArtist,
    },
    Line::Field {
        label: "Current music preference",
        key: SurveyField::Preference,
    },
    Line::Aggregate {
        label: "Discovers new music through",
        flags: &[
            flag(SurveyField::NewMusicDiscovery(1), "TikTok/Reels"),
            flag(SurveyField::NewMusicDiscovery(2), "streaming playlists"),
            flag(SurveyField::NewMusicDiscovery(3), "friend recommendations"),
            flag(SurveyField::NewMusicDiscovery(4), "movie/TV soundtracks"),
            flag(SurveyField::NewMusicDiscovery(5), "Shazam"),
            flag(SurveyField::NewMusicDiscovery(6), "music blogs"),
            flag(SurveyField::NewMusicDiscovery(7), "replays favorites"),
        ],
    },
    Line::Field {
        label: "View on AI-generated music",
        key: SurveyField::AiSongs,
    },
    Line::Field {
        label: "View on AI using dead artists' voices",
        key: SurveyField::DeadArtistVoice,
    },
    Line::Aggregate {
        label: "Listens to music often/always when",
        flags: &[
            Flag {
                key: SurveyField::ListenTime(1),
                phrase: "waking up",
                accepts: FREQUENT,
            },
            Flag {
                key: SurveyField::ListenTime(2),
                phrase: "commuting",
                accepts: FREQUENT,
            },
            Flag {
                key: SurveyField::ListenTime(3),
                phrase: "working out",
                accepts: FREQUENT,
            },
            Flag {
                key: SurveyField::ListenTime(4),
                phrase: "cooking",
                accepts: FREQUENT,
            },
            Flag {
                key: SurveyField::ListenTime(5),
                phrase: "cleaning",
                accepts: FREQUENT,
            },
            Flag {
                key: SurveyField::ListenTime(6),
                phrase: "unwinding",
                accepts: FREQUENT,
            },
        ],
    },
    Line::Aggregate {
        label: "Music behaviors",
        flags: &[
            flag(SurveyField::Bingo(1), "makes breakup playlists"),
            flag(SurveyField::Bingo(2), "plays DJ on road trips"),
            flag(SurveyField::Bingo(3), "uses music for motivation"),
            flag(SurveyField::Bingo(4), "cries to sad songs"),
            flag(SurveyField::Bingo(5), "shares songs romantically"),
            flag(SurveyField::Bingo(6), "makes vibe playlists"),
            flag(SurveyField::Bingo(7), "replays same song many times"),
        ],
    },
    Line::OptOut {
        key: SurveyField::Sharing(6),
        text: "Doesn't share music",
        otherwise: &Line::Aggregate {
            label: "Shares music by",
            flags: &[
                flag(SurveyField::Sharing(1), "texts links"),
                flag(SurveyField::Sharing(2), "group chats"),
                flag(SurveyField::Sharing(3), "social media"),
                flag(SurveyField::Sharing(4), "curates playlists"),
                flag(SurveyField::Sharing(5), "in-person"),
            ],
        },
    },
    Line::Field {
        label: "When friend shares music",
        key: SurveyField::FriendShares,
    },
    Line::Field {
        label: "Guilty pleasure attitude",
        key: SurveyField::GuiltyPleasure,
    },
    Line::Field {
        label: "Guilty pleasure song",
        key: SurveyField::GuiltyPleasureSong,
    },
    // enrichment from the extraction pipeline
    Line::Field {
        label: "Genre preference",
        key: SurveyField::ExtractedGenre,
    },
    Line::Field {
        label: "Favorite artist",
        key: SurveyField::ExtractedFavouriteBand,
    },
];

/// Render an answer set into its identity string.
///
/// Total and deterministic: the same answers always give byte-identical
/// output. An answer set with nothing usable yields an empty string, which
/// callers must reject before embedding.
pub fn build_identity_string(answers: &AnswerSet) -> String {
    match answers {
        AnswerSet::Quiz(quiz) => render(quiz, QUIZ_TEMPLATE),
        AnswerSet::Survey(survey) => render(survey.as_ref(), SURVEY_TEMPLATE),
    }
}

/// Render `answers` against an arbitrary template.
pub fn render<A: Answers>(answers: &A, template: &[Line<A::Key>]) -> String {
    template
        .iter()
        .filter_map(|line| render_line(answers, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_line<A: Answers>(answers: &A, line: &Line<A::Key>) -> Option<String> {
    match line {
        Line::Field { label, key } => {
            present(answers, *key).map(|value| format!("{label}: {value}"))
        }
        Line::Aggregate { label, flags } => {
            let phrases: Vec<&str> = flags
                .iter()
                .filter(|flag| {
                    present(answers, flag.key)
                        .map(|value| flag.accepts.matches(value.trim()))
                        .unwrap_or(false)
                })
                .map(|flag| flag.phrase)
                .collect();

            if phrases.is_empty() {
                None
            } else {
                Some(format!("{label}: {}", phrases.join(", ")))
            }
        }
        Line::OptOut {
            key,
            text,
            otherwise,
        } => {
            if present(answers, *key).is_some() {
                Some(text.to_string())
            } else {
                render_line(answers, otherwise)
            }
        }
    }
}

/// The raw answer if it is non-blank. The value itself is not trimmed.
fn present<A: Answers>(answers: &A, key: A::Key) -> Option<&str> {
    answers
        .answer(key)
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{QuizAnswers, SurveyResponse};

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn full_quiz() -> QuizAnswers {
        QuizAnswers {
            relationship: some("It's my whole life"),
            discovery: some("My dad's vinyl collection"),
            preference: some("Sad girl indie"),
            ai_view: some("Nah, needs human soul"),
            dead_artist_view: some("Feels wrong to me"),
            sharing: some("Always sending songs"),
        }
    }

    #[test]
    fn test_quiz_full_render() {
        let identity = build_identity_string(&full_quiz().into());
        assert_eq!(
            identity,
            "Music relationship: It's my whole life\n\
             First discovered music through: My dad's vinyl collection\n\
             Current music preference: Sad girl indie\n\
             View on AI-generated music: Nah, needs human soul\n\
             View on AI using dead artists' voices: Feels wrong to me\n\
             Music sharing behavior: Always sending songs"
        );
    }

    #[test]
    fn test_deterministic() {
        let answers: AnswerSet = full_quiz().into();
        assert_eq!(build_identity_string(&answers), build_identity_string(&answers));
    }

    #[test]
    fn test_single_character_floor() {
        let answers = QuizAnswers {
            relationship: some("a"),
            discovery: some("b"),
            preference: some("c"),
            ai_view: some("d"),
            dead_artist_view: some("e"),
            sharing: some("f"),
        };
        let identity = build_identity_string(&answers.into());
        assert!(!identity.is_empty());
        assert_eq!(identity.lines().count(), 6);
    }

    #[test]
    fn test_blank_preference_is_omitted() {
        let answers = QuizAnswers {
            relationship: some("obsessed"),
            discovery: some("TikTok"),
            preference: some(""),
            ai_view: some("no"),
            dead_artist_view: some("weird"),
            sharing: some("always"),
        };
        let identity = build_identity_string(&answers.into());

        assert!(!identity.contains("Current music preference"));
        assert_eq!(identity.lines().count(), 5);
        assert!(!identity.contains("\n\n"));
    }

    #[test]
    fn test_every_omitted_quiz_field_drops_its_label() {
        let labels = [
            (QuizField::Relationship, "Music relationship"),
            (QuizField::Discovery, "First discovered music through"),
            (QuizField::Preference, "Current music preference"),
            (QuizField::AiView, "View on AI-generated music"),
            (QuizField::DeadArtistView, "View on AI using dead artists' voices"),
            (QuizField::Sharing, "Music sharing behavior"),
        ];

        for (field, label) in labels {
            let mut answers = full_quiz();
            answers.set(field, "   ".to_string());
            let identity = build_identity_string(&answers.into());

            assert!(
                !identity.lines().any(|line| line.starts_with(label)),
                "label {label:?} still rendered"
            );
            assert_eq!(identity.lines().count(), 5);
        }
    }

    #[test]
    fn test_values_are_not_normalized() {
        let mut answers = full_quiz();
        answers.set(QuizField::Preference, "  LOUD Noise ".to_string());
        let identity = build_identity_string(&answers.into());
        assert!(identity.contains("Current music preference:   LOUD Noise "));
    }

    #[test]
    fn test_empty_answers_render_empty() {
        let identity = build_identity_string(&QuizAnswers::default().into());
        assert!(identity.is_empty());
    }

    fn survey() -> SurveyResponse {
        SurveyResponse {
            participant_id: "p1".to_string(),
            relationship: some("Obsessed"),
            first_discovery: some("Radio"),
            preference: some("Jazz"),
            ai_songs: some("Meh"),
            dead_artist_voice: some("Creepy"),
            ..Default::default()
        }
    }

    #[test]
    fn test_survey_core_lines() {
        let identity = build_identity_string(&survey().into());
        assert_eq!(
            identity,
            "Music relationship: Obsessed\n\
             First discovered music through: Radio\n\
             Current music preference: Jazz\n\
             View on AI-generated music: Meh\n\
             View on AI using dead artists' voices: Creepy"
        );
    }

    #[test]
    fn test_survey_aggregates() {
        let mut response = survey();
        response.discover_1 = some("1");
        response.discover_5 = some("1");
        response.listen_time_2 = some("Always");
        response.listen_time_3 = some("Never");
        response.listen_time_6 = some("Often");
        response.share_2 = some("1");
        response.share_4 = some("1");

        let identity = build_identity_string(&response.into());
        let lines: Vec<&str> = identity.lines().collect();

        assert!(lines.contains(&"Discovers new music through: TikTok/Reels, Shazam"));
        assert!(lines.contains(&"Listens to music often/always when: commuting, unwinding"));
        assert!(lines.contains(&"Shares music by: group chats, curates playlists"));
        assert!(!identity.contains("Music behaviors"));
    }

    #[test]
    fn test_survey_grid_without_frequent_values_is_omitted() {
        let mut response = survey();
        response.listen_time_1 = some("Sometimes");
        response.listen_time_4 = some("Never");

        let identity = build_identity_string(&response.into());
        assert!(!identity.contains("Listens to music"));
    }

    #[test]
    fn test_survey_opt_out_replaces_sharing_methods() {
        let mut response = survey();
        response.share_1 = some("1");
        response.share_6 = some("1");

        let identity = build_identity_string(&response.into());
        assert!(identity.lines().any(|line| line == "Doesn't share music"));
        assert!(!identity.contains("Shares music by"));
    }

    #[test]
    fn test_survey_enrichment_comes_last() {
        let mut response = survey();
        response.guilty_pleasure = some("No shame");
        response.extracted_genre = some("indie");
        response.extracted_favourite_band = some("Radiohead");

        let identity = build_identity_string(&response.into());
        let lines: Vec<&str> = identity.lines().collect();
        let n = lines.len();

        assert_eq!(lines[n - 2], "Genre preference: indie");
        assert_eq!(lines[n - 1], "Favorite artist: Radiohead");
        assert_eq!(lines[n - 3], "Guilty pleasure attitude: No shame");
    }

    #[test]
    fn test_quiz_and_survey_share_labels() {
        let quiz = build_identity_string(&full_quiz().into());
        let survey = build_identity_string(&survey().into());

        let label = |line: &str| line.split(':').next().unwrap_or_default().to_string();
        let survey_labels: Vec<String> = survey.lines().map(label).collect();

        for line in quiz.lines().filter(|l| !l.starts_with("Music sharing")) {
            assert!(survey_labels.contains(&label(line)), "missing {line}");
        }
    }
}
