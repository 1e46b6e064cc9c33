//! Activity suggestions to go with a mood.
//!
//! Each mood has a short list of activities for every age group plus a
//! generic list. [`pick_activity`] tries the age-specific list first, then
//! the generic one, and finally settles on [`DEFAULT_ACTIVITY`] when the
//! mood is not one it knows.

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use crate::mood::Mood;

/// Suggestion for moods outside the known vocabulary
pub const DEFAULT_ACTIVITY: &str = "Take a break";

/// Age groups with dedicated suggestions
pub const AGE_GROUPS: [&str; 5] = ["13-17", "18-25", "26-35", "36-50", "50+"];

/// Generic suggestions for a mood, used when the age group has no list
#[must_use]
pub fn generic_activities(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Happy => &["Dance to a Bollywood hit!", "Call a friend for a chai", "Go for a sunny walk", "Watch a comedy clip"],
        Mood::Energetic => &["Do a 10-min Bhangra workout", "Go for a run", "Clean your room to fast beats", "Do a cycling sprint"],
        Mood::Calm => &["Enjoy a quiet cup of tea", "Read a book by the window", "Do some gentle stretching", "Listen to old classics"],
        Mood::Sad => &["Write your feelings in a journal", "Take a long warm shower", "Wrap yourself in a blanket", "Watch a comforting movie"],
        Mood::Stressed => &["Take 3 deep breaths", "Drink some water", "Step outside for fresh air", "Close your eyes for 5 mins"],
    }
}

/// Suggestions tailored to a mood and age group, if that age group has any
#[must_use]
pub fn age_activities(mood: Mood, age_group: &str) -> Option<&'static [&'static str]> {
    let list: &'static [&'static str] = match (mood, age_group) {
        (Mood::Happy, "13-17") => &["Keep the vibe alive! Make a fun Reel/TikTok.", "Level up the fun! Game with friends.", "Stay sweet. Go get ice cream."],
        (Mood::Happy, "18-25") => &["Make memories! Plan a weekend trip.", "Treat yourself. Go for a coffee run.", "Be bold! Text your crush."],
        (Mood::Happy, "26-35") => &["Savor the moment. Cook a nice meal.", "You deserve it. Take a break from work.", "Reconnect. Call an old friend."],
        (Mood::Happy, "36-50") => &["Cherish the time. Enjoy family moments.", "Clear your head. Go for a long drive.", "Get creative. Try a new recipe."],
        (Mood::Happy, "50+") => &["Simple joys. Relax in the garden.", "Family first. Call the grandkids.", "Nostalgia trip. Listen to radio hits."],

        (Mood::Energetic, "13-17") => &["Get moving! Play sports outside.", "Show your moves! Learn a viral dance.", "Speed up! Skate or cycle."],
        (Mood::Energetic, "18-25") => &["Beast mode! Hit the gym.", "Clear your mind. Go for a run.", "Fresh start. Cleaning spree!"],
        (Mood::Energetic, "26-35") => &["Stay active. Quick home workout.", "Get some air. Go for a jog.", "Productivity boost! Tackle that to-do list."],
        (Mood::Energetic, "36-50") => &["Active living. Walk the dog briskly.", "Nature time. Do some gardening.", "Find flow. Yoga session."],
        (Mood::Energetic, "50+") => &["Healthy start. Morning walk.", "Stay flexible. Light stretching.", "Find balance. Gentle Yoga."],

        (Mood::Calm, "13-17") => &["Unleash creativity. Draw or doodle.", "Chill vibes. Listen to a podcast.", "Recharge. Nap time."],
        (Mood::Calm, "18-25") => &["Find your center. Meditate for 10 mins.", "Escape reality. Read a new book.", "Log off. Digital detox."],
        (Mood::Calm, "26-35") => &["Warm up. Drink herbal tea.", "Cozy vibes. Light a candle.", "Focus mode. Listen to instrumental."],
        (Mood::Calm, "36-50") => &["Stay informed. Read the newspaper.", "Peaceful evening. Go for a walk.", "Quiet time. Sit on the balcony."],
        (Mood::Calm, "50+") => &["Inner peace. Prayer/Meditation.", "Sharpen the mind. Solve a crossword.", "Nature's beauty. Watch the birds."],

        (Mood::Sad, "13-17") => &["It's okay. Watch a comfort show.", "Puppy love. Hug a pet.", "Feel the feels. Listen to sad songs."],
        (Mood::Sad, "18-25") => &["Let it out. Journal your thoughts.", "Reach out. Call your best friend.", "Comfort first. Order your fav food."],
        (Mood::Sad, "26-35") => &["Self-care. Take a mental health day.", "Escape. Watch a movie.", "Unplug. Disconnect for an hour."],
        (Mood::Sad, "36-50") => &["Share the load. Talk to a friend.", "Warm the soul. Cook comfort food.", "Just breathe. Rest."],
        (Mood::Sad, "50+") => &["Memory lane. Look at old photos.", "Take it easy. Rest and recover.", "Connect. Call a family member."],

        (Mood::Stressed, "13-17") => &["Pause. Take a break from homework.", "Distract yourself. Play a relaxing game.", "Breathe deep. 4-7-8 breathing."],
        (Mood::Stressed, "18-25") => &["Unplug. Step away from screens.", "Move a bit. Go for a walk.", "Release tension. Stretch."],
        (Mood::Stressed, "26-35") => &["Work can wait. Close the laptop.", "Sip and relax. Make a chai.", "Reset. 5-min meditation."],
        (Mood::Stressed, "36-50") => &["Silence is golden. Sit quietly.", "Ground yourself. Gardening break.", "Tea time. Brew a fresh cup."],
        (Mood::Stressed, "50+") => &["Fresh air. Sit outside.", "Soothing sounds. Listen to bhajans.", "Rest your eyes. Short nap."],

        _ => return None,
    };
    Some(list)
}

/// Pick one activity for `mood` and `age_group`.
///
/// # Returns
///
/// A random entry from the age-specific list if there is one, otherwise a
/// random entry from the mood's generic list, otherwise
/// [`DEFAULT_ACTIVITY`]. The mood is matched case-insensitively.
///
/// # Examples
///
/// ```
/// use moodmix::activity::pick_activity;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(1);
/// assert_eq!(pick_activity("angry", "18-25", &mut rng), "Take a break");
/// ```
pub fn pick_activity<R: Rng + ?Sized>(mood: &str, age_group: &str, rng: &mut R) -> &'static str {
    let Ok(mood) = mood.parse::<Mood>() else {
        return DEFAULT_ACTIVITY;
    };

    let list = age_activities(mood, age_group).unwrap_or_else(|| generic_activities(mood));
    list.choose(rng).copied().unwrap_or(DEFAULT_ACTIVITY)
}

/// [`pick_activity`] with the thread-local random source
#[must_use]
pub fn suggest(mood: &str, age_group: &str) -> &'static str {
    pick_activity(mood, age_group, &mut thread_rng())
}
