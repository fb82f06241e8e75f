use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

mod handlers;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about = "Find your music taste twin", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Quiz answers given as flags.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct AnswerArgs {
    /// Q1: What's your relationship with music like?
    #[clap(long)]
    pub relationship: Option<String>,

    /// Q2: How did you first discover music you loved?
    #[clap(long)]
    pub discovery: Option<String>,

    /// Q3: What kind of music are you into these days?
    #[clap(long)]
    pub preference: Option<String>,

    /// Q4: How do you feel about AI making music?
    #[clap(long)]
    pub ai_view: Option<String>,

    /// Q5: AI using dead artists' voices to make new songs?
    #[clap(long)]
    pub dead_artist_view: Option<String>,

    /// Q6: Do you share music with people?
    #[clap(long)]
    pub sharing: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take the quiz interactively and print your matches.
    Quiz {
        /// Number of matches
        #[clap(short, long)]
        k: Option<usize>,

        /// Print the matches as json instead of a report
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Match answers given on the command line. Prints json.
    Match {
        #[command(flatten)]
        answers: AnswerArgs,

        /// Answers as a json object, e.g. '{"q1": "...", "q3": "..."}'.
        /// Flags override keys from here.
        #[clap(long = "answers", value_name = "JSON")]
        answers_json: Option<String>,

        /// Number of matches
        #[clap(short, long)]
        k: Option<usize>,
    },

    /// Embed a survey export into a corpus snapshot.
    BuildCorpus {
        /// Cleaned survey csv
        #[clap(short, long)]
        input: PathBuf,

        /// Snapshot path. Defaults to the configured snapshot.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about the loaded corpus.
    Corpus {},

    /// Start the matching service.
    Daemon {
        /// Listen address. Defaults to the configured one.
        #[clap(short, long)]
        listen: Option<String>,
    },
}
