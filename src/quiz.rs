use inquire::{required, Text};
use serde::Serialize;

use crate::semantic::MatchResult;
use crate::survey::{QuizAnswers, QuizField};

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: u8,
    #[serde(skip)]
    pub key: QuizField,
    pub question: &'static str,
    pub placeholder: &'static str,
    pub hint: &'static str,
}

pub const QUESTIONS: &[Question] = &[
    Question {
        id: 1,
        key: QuizField::Relationship,
        question: "What's your relationship with music like?",
        placeholder: "e.g., 'It's my whole life' or 'I'm pretty casual about it'",
        hint: "Just a sentence or two",
    },
    Question {
        id: 2,
        key: QuizField::Discovery,
        question: "How did you first discover music you loved?",
        placeholder: "e.g., 'My dad's vinyl collection' or 'TikTok algorithm'",
        hint: "What was the gateway?",
    },
    Question {
        id: 3,
        key: QuizField::Preference,
        question: "What kind of music are you into these days?",
        placeholder: "e.g., 'Sad girl indie' or 'Anything I can dance to'",
        hint: "Vibe, genre, mood - whatever",
    },
    Question {
        id: 4,
        key: QuizField::AiView,
        question: "Real talk - how do you feel about AI making music?",
        placeholder: "e.g., 'If it's good, it's good' or 'Nah, needs human soul'",
        hint: "No judgment, just curious",
    },
    Question {
        id: 5,
        key: QuizField::DeadArtistView,
        question: "What about AI using dead artists' voices to make new songs?",
        placeholder: "e.g., 'Kinda cool' or 'Feels wrong to me'",
        hint: "First reaction is fine",
    },
    Question {
        id: 6,
        key: QuizField::Sharing,
        question: "Do you share music with people, or keep it to yourself?",
        placeholder: "e.g., 'Always sending songs' or 'It's my private thing'",
        hint: "How social are you with your taste?",
    },
];

/// Prompt for every quiz question on the terminal.
pub fn ask_questions() -> inquire::error::InquireResult<QuizAnswers> {
    let mut answers = QuizAnswers::default();
    let total = QUESTIONS.len();

    for q in QUESTIONS {
        let prompt = format!("[{}/{}] {}", q.id, total, q.question);
        let answer = Text::new(&prompt)
            .with_placeholder(q.placeholder)
            .with_help_message(q.hint)
            .with_validator(required!("Please provide an answer!"))
            .prompt()?;

        answers.set(q.key, answer.trim().to_string());
    }

    Ok(answers)
}

fn field<'a>(m: &'a MatchResult, key: &str) -> &'a str {
    m.data.get(key).map(String::as_str).unwrap_or("N/A")
}

fn percent(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

/// Human-readable report: the best match in full, the rest as a short list.
pub fn format_report(matches: &[MatchResult]) -> String {
    let Some(best) = matches.first() else {
        return "No matches found.\n".to_string();
    };

    let rule = "=".repeat(80);
    let mut lines = vec![
        rule.clone(),
        "Found your music taste twin!".to_string(),
        rule.clone(),
        String::new(),
        format!("Participant ID: {}", best.participant_id),
        format!("Similarity Score: {}", percent(best.similarity_score)),
        String::new(),
        "--- Their Music Profile ---".to_string(),
        format!(
            "Relationship with music: {}",
            field(best, "Q1_Relationship_with_music")
        ),
        format!(
            "How they discover music: {}",
            field(best, "Q2_Discovering_music")
        ),
        format!(
            "Artist that pulled them in: {}",
            field(best, "Q3_artist_that_pulled_you_in")
        ),
        format!(
            "Music format change: {}",
            field(best, "Q4_Music_format_changes")
        ),
        format!(
            "Current preference: {}",
            field(best, "Q9_Music_preference_these_days")
        ),
        String::new(),
        "--- AI Opinions ---".to_string(),
        format!("Songs by AI: {}", field(best, "Q10_Songs_by_AI")),
        format!(
            "Dead artists' voice feelings: {}",
            field(best, "Q11_Use_of_dead_artists_voice_feelings")
        ),
        String::new(),
        "--- Demographics ---".to_string(),
        format!("Age: {}", field(best, "Age")),
        format!("Gender: {}", field(best, "Gender")),
        format!("Location: {}", field(best, "Province")),
        rule,
    ];

    let others = &matches[1..];
    if !others.is_empty() {
        lines.push(String::new());
        lines.push(format!("--- Other Top {} Matches ---", others.len()));
        for (i, m) in others.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!(
                "#{} - Participant {} ({} match)",
                i + 2,
                m.participant_id,
                percent(m.similarity_score)
            ));
            lines.push(format!("  - {}", field(m, "Q1_Relationship_with_music")));
            lines.push(format!("  - {}", field(m, "Q9_Music_preference_these_days")));
            lines.push(format!("  - AI views: {}", field(m, "Q10_Songs_by_AI")));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
