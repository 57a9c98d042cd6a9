//! Per-genre narrative templates.
//!
//! Every template takes the same three slots: the primary object, a secondary
//! detail, and an atmosphere label. Dispatch is an exhaustive `match` on
//! [`Genre`], so a genre without a template does not compile.

use crate::models::{Genre, Prediction, StoryText};

pub const FALLBACK_PRIMARY: &str = "mysterious scene";
pub const FALLBACK_SECONDARY: &str = "intriguing detail";
pub const FALLBACK_ATMOSPHERE: &str = "unique environment";

/// The three interpolation slots shared by all templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub primary: String,
    pub secondary: String,
    pub atmosphere: String,
}

impl Labels {
    /// Takes the first three ranks; a missing or blank rank gets its own fallback.
    pub fn from_ranked<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranked = labels.into_iter();
        let mut slot = |fallback: &str| {
            ranked
                .next()
                .map(|label| short_label(label.as_ref()).to_string())
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        let primary = slot(FALLBACK_PRIMARY);
        let secondary = slot(FALLBACK_SECONDARY);
        let atmosphere = slot(FALLBACK_ATMOSPHERE);

        Labels {
            primary,
            secondary,
            atmosphere,
        }
    }

    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        Self::from_ranked(predictions.iter().map(|p| p.label.as_str()))
    }
}

/// Classifier labels often list synonyms ("tabby, tabby cat"); keep the first.
fn short_label(label: &str) -> &str {
    label.split(',').next().unwrap_or_default().trim()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub type Template = fn(&Labels) -> StoryText;

pub fn template_for(genre: Genre) -> Template {
    match genre {
        Genre::Fantasy => fantasy,
        Genre::SciFi => sci_fi,
        Genre::Romance => romance,
        Genre::Mystery => mystery,
        Genre::Adventure => adventure,
        Genre::Horror => horror,
    }
}

pub fn compose(genre: Genre, labels: &Labels) -> StoryText {
    template_for(genre)(labels)
}

fn fantasy(l: &Labels) -> StoryText {
    let (main, secondary, atmosphere) = (&l.primary, &l.secondary, &l.atmosphere);
    StoryText {
        title: format!("The Enchanted {}", capitalize(main)),
        content: format!(
            "In a realm where magic permeated every shadow and whisper, an extraordinary {main} stood as a beacon of ancient power. The {secondary} nearby seemed to pulse with an otherworldly energy, casting ethereal reflections across the {atmosphere}. Legends spoke of such places, where the veil between worlds grew thin and the impossible became reality.\n\n\
             As our hero approached, the air itself began to shimmer with arcane potential. The {main} held secrets that had been guarded by generations of mystical beings, each leaving their mark on this sacred space. The {secondary} appeared to respond to their presence, its energy intertwining with the ancient magics that permeated the area.\n\n\
             What started as a simple journey had led to this moment of discovery, where destiny and magic converged in ways that would forever alter the fabric of this enchanted realm. The {atmosphere} itself seemed to hold its breath, waiting to witness what would unfold in this nexus of power and possibility."
        ),
    }
}

fn sci_fi(l: &Labels) -> StoryText {
    let (main, secondary, atmosphere) = (&l.primary, &l.secondary, &l.atmosphere);
    StoryText {
        title: format!("{} Protocol", capitalize(main)),
        content: format!(
            "The quantum readings from the {main} defied every known law of physics. Dr. Chen's holographic displays erupted with cascading data as the {secondary} began emitting previously unrecorded energy signatures. The {atmosphere} around the site crackled with electromagnetic anomalies that shouldn't have been possible in this dimension.\n\n\
             Initial scans suggested technology far beyond current human capabilities, perhaps even evidence of non-terrestrial origin. The {main}'s structure appeared to shift and reconfigure at the quantum level, adapting to some unknown protocol or directive. The nearby {secondary} seemed to be responding in kind, creating a synchronized pattern that our instruments barely registered.\n\n\
             As the research team worked to decode these phenomena, one thing became clear: this discovery would revolutionize humanity's understanding of the universe and our place within it. The {atmosphere} continued to fluctuate with each new breakthrough, hinting at possibilities that were once confined to the realm of science fiction."
        ),
    }
}

fn romance(l: &Labels) -> StoryText {
    let (main, secondary, atmosphere) = (&l.primary, &l.secondary, &l.atmosphere);
    StoryText {
        title: format!("Love by the {}", capitalize(main)),
        content: format!(
            "The {main} had always been their special place, but today it held a different kind of magic. The way the light played across the {secondary} created a moment that seemed to exist outside of time itself. The {atmosphere} perfectly captured the delicate balance between familiarity and the exciting unknown that defined their relationship.\n\n\
             Years of friendship had built to this moment, where words became secondary to the unspoken understanding between them. The {main} stood as a silent witness to their story, just as it had witnessed countless moments of their growing connection. The {secondary} caught the last rays of sunset, painting everything in hues that matched the warmth in their hearts.\n\n\
             Sometimes love reveals itself in the most ordinary places, transforming them into something extraordinary. As they stood there, surrounded by the gentle embrace of the {atmosphere}, both knew that this was just the beginning of their greatest adventure together."
        ),
    }
}

fn mystery(l: &Labels) -> StoryText {
    let (main, secondary, atmosphere) = (&l.primary, &l.secondary, &l.atmosphere);
    StoryText {
        title: format!("The {} Enigma", capitalize(main)),
        content: format!(
            "Detective Sarah Morgan studied the {main} intently, knowing it held the key to unraveling this perplexing case. The presence of the {secondary} couldn't be coincidental - nothing about this scene followed the expected pattern. The {atmosphere} only added to the unsettling nature of the discovery.\n\n\
             Years of experience told her that every detail mattered, from the peculiar positioning of the {main} to the subtle disturbances around the {secondary}. Each element seemed carefully arranged, yet something about the scene felt fundamentally wrong. The {atmosphere} preserved clues that others might have missed, but what story were they telling?\n\n\
             As rain began to fall, Morgan realized this was more than just another case. Someone had orchestrated this elaborate puzzle, and she was determined to uncover the truth hidden within its layers of deception."
        ),
    }
}

fn adventure(l: &Labels) -> StoryText {
    let (main, secondary, atmosphere) = (&l.primary, &l.secondary, &l.atmosphere);
    StoryText {
        title: format!("Quest for the {}", capitalize(main)),
        content: format!(
            "After months of following ancient maps and cryptic clues, the expedition team finally stood before the legendary {main}. The weathered {secondary} marked the entrance to what they believed was the greatest discovery of the century. The {atmosphere} hummed with the promise of adventure and discovery.\n\n\
             Generations of explorers had sought this place, but none had managed to decipher the complex trail of breadcrumbs left by the lost civilization. The {main} stood as a testament to their advanced knowledge, while the {secondary} hinted at secrets still waiting to be uncovered. The surrounding {atmosphere} seemed to guard its mysteries jealously.\n\n\
             As they prepared to take the first steps into the unknown, each team member knew that this moment would be remembered in history. The real challenge, however, was only beginning."
        ),
    }
}

fn horror(l: &Labels) -> StoryText {
    let (main, secondary, atmosphere) = (&l.primary, &l.secondary, &l.atmosphere);
    StoryText {
        title: format!("The {} Haunting", capitalize(main)),
        content: format!(
            "At first glance, the {main} appeared ordinary enough, but something about it sent chills down their spine. The {secondary} they discovered only confirmed their growing sense of dread. Even the {atmosphere} seemed to twist and distort in ways that defied natural law.\n\n\
             As night fell, the true nature of the place began to reveal itself. Shadows moved against their light sources, and sounds that shouldn't exist echoed through the {main}. The {secondary} appeared to change positions when no one was watching, and the {atmosphere} grew thick with an ancient, malevolent presence.\n\n\
             They quickly realized their grave mistake: some doors, once opened, can never be closed again. Whatever dwelled within the {main} had been waiting for them, and now it was too late to turn back."
        ),
    }
}
