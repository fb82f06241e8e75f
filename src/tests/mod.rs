
use std::path::Path;

use crate::semantic::{build_corpus, HashEmbedder, MatchService, RetryPolicy};
use crate::survey::read_survey;

pub(crate) const SURVEY_CSV: &str = "\
participant_id,Age,Gender,Province,Q1_Relationship_with_music,Q2_Discovering_music,\
Q9_Music_preference_these_days,Q10_Songs_by_AI,Q11_Use_of_dead_artists_voice_feelings,\
Q7_New_music_discover_1,Q8_Music_listen_time_GRID_3
R_alpha,19,Woman,Ontario,It's my whole life,TikTok algorithm,Sad girl indie,\
Nah needs human soul,Feels wrong to me,,
R_beta,34,Man,Quebec,Pretty casual,My dad's vinyl collection,Classic rock,\
If it's good it's good,Kinda cool,1,Always
R_gamma,52,,Alberta,Background noise,Radio,Country,Don't care,,,Never
";

pub(crate) const DIMS: usize = 32;

/// Embed the fixture survey with the hash embedder and write it to `path`.
pub(crate) fn write_fixture_snapshot(path: &Path) {
    let responses = read_survey(SURVEY_CSV.as_bytes()).unwrap();
    let store = build_corpus(responses, &HashEmbedder::new(DIMS), 2, None).unwrap();
    store.save(path).unwrap();
}

pub(crate) fn fixture_service(path: &Path) -> MatchService {
    write_fixture_snapshot(path);
    MatchService::open(
        Box::new(HashEmbedder::new(DIMS)),
        path,
        RetryPolicy::none(),
        2,
    )
    .unwrap()
}
