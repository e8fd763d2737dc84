//! The daily letter pipeline: yesterday's unsent diary entries are turned
//! into a four-section letter by the generative model, rendered to HTML,
//! and mailed out. Every entry is processed independently; a failure logs
//! and moves on. `sent_at` on the diary row is the idempotency guard, so
//! running the job twice for the same date sends nothing the second time.

pub mod mailer;
pub mod store;

use crate::config::LettersConfig;
use crate::error::Result;
use crate::gemini::{extract_json_block, GeminiClient};
use crate::metrics;
use askama::Template;
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use mailer::Mailer;
use store::{FavoritePhrase, JournalStore, PendingLetter};

/// The four sections the model is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LetterContent {
    pub intro: String,
    pub diary_feedback: String,
    pub phrase_feedback: String,
    pub outro: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct LetterRunSummary {
    pub pending: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Template)]
#[template(path = "letter_email.html")]
struct LetterEmailTemplate<'a> {
    recipient_name: &'a str,
    date: &'a str,
    intro: &'a str,
    diary_feedback: &'a str,
    phrase_feedback: &'a str,
    outro: &'a str,
}

pub fn letter_prompt(
    diary_content: &str,
    diary_mood: Option<&str>,
    phrase: &str,
    phrase_author: Option<&str>,
) -> String {
    let mood_line = diary_mood
        .map(|mood| format!("\nMood: {mood}"))
        .unwrap_or_default();
    let author_line = phrase_author
        .map(|author| format!("\n- {author}"))
        .unwrap_or_default();
    format!(
        "You write warm, thoughtful morning letters in the style of a poetry newsletter.\n\
         Use the reader's diary entry from yesterday and a phrase they love to write today's letter.\n\n\
         Yesterday's diary:\n{diary_content}{mood_line}\n\n\
         Favorite phrase:\n\"{phrase}\"{author_line}\n\n\
         ---\n\n\
         Write the letter in four sections:\n\n\
         1. intro (greeting, 2-3 sentences): a morning greeting and a warm opening for the day\n\
         2. diaryFeedback (3-4 sentences): acknowledge and empathize with yesterday's entry, mentioning its specifics\n\
         3. phraseFeedback (3-4 sentences): interpret the phrase and connect it to the reader's life\n\
         4. outro (2 sentences): closing encouragement for the day ahead\n\n\
         Tone: poetic but restrained, like a friend who respects you. Avoid cliches.\n\n\
         Respond as JSON:\n\
         ```json\n\
         {{\n  \"intro\": \"...\",\n  \"diaryFeedback\": \"...\",\n  \"phraseFeedback\": \"...\",\n  \"outro\": \"...\"\n}}\n\
         ```"
    )
}

/// The letter used whenever the model is unavailable or returns something
/// unparseable. Built from the diary excerpt and the phrase so the email
/// still reads personally.
pub fn fallback_letter(diary_content: &str, phrase: &str) -> LetterContent {
    let excerpt: String = diary_content.chars().take(50).collect();
    LetterContent {
        intro: "Good morning. A new day is starting.".to_string(),
        diary_feedback: format!(
            "Thank you for writing down your yesterday. \"{excerpt}...\" — your honesty comes through in those words."
        ),
        phrase_feedback: format!(
            "\"{phrase}\" — this feels like exactly the sentence today's version of you needs."
        ),
        outro: "I'm rooting for your day. Make it a good one.".to_string(),
    }
}

pub struct LetterService {
    store: Arc<JournalStore>,
    gemini: Option<GeminiClient>,
    mailer: Option<Mailer>,
    config: LettersConfig,
}

impl LetterService {
    pub fn new(
        store: Arc<JournalStore>,
        gemini: Option<GeminiClient>,
        mailer: Option<Mailer>,
        config: LettersConfig,
    ) -> Self {
        Self {
            store,
            gemini,
            mailer,
            config,
        }
    }

    pub fn store(&self) -> &Arc<JournalStore> {
        &self.store
    }

    /// Smoke-tests the SMTP relay. False when mail is not configured.
    pub async fn verify_mailer(&self) -> Result<bool> {
        match &self.mailer {
            Some(mailer) => mailer.test_connection().await,
            None => Ok(false),
        }
    }

    /// Composes a letter for one pending entry, falling back to the
    /// template on any model or parse failure.
    async fn compose(&self, pending: &PendingLetter, phrase: &FavoritePhrase) -> LetterContent {
        let Some(gemini) = &self.gemini else {
            metrics::letter_fallback();
            return fallback_letter(&pending.content, &phrase.content);
        };

        let prompt = letter_prompt(
            &pending.content,
            pending.mood.as_deref(),
            &phrase.content,
            phrase.author.as_deref(),
        );
        match gemini.generate(&prompt).await {
            Ok(text) => match extract_json_block(&text)
                .and_then(|block| serde_json::from_str::<LetterContent>(&block).ok())
            {
                Some(letter) => {
                    metrics::letter_generated();
                    letter
                }
                None => {
                    warn!("Model response had no parseable letter JSON, using fallback");
                    metrics::letter_fallback();
                    fallback_letter(&pending.content, &phrase.content)
                }
            },
            Err(e) => {
                warn!("Letter generation failed ({e}), using fallback");
                metrics::letter_fallback();
                fallback_letter(&pending.content, &phrase.content)
            }
        }
    }

    /// Runs the letter job for one diary date.
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<LetterRunSummary> {
        let pending = self.store.pending_for_date(date)?;
        info!("Found {} diary entries to process for {date}", pending.len());

        let mut summary = LetterRunSummary {
            pending: pending.len(),
            ..Default::default()
        };

        for entry in &pending {
            let phrases = self.store.list_phrases(entry.user_id)?;
            let Some(phrase) = phrases.choose(&mut rand::thread_rng()).cloned() else {
                warn!("No favorite phrases for user {}, skipping", entry.user_id);
                summary.skipped += 1;
                continue;
            };

            let letter = self.compose(entry, &phrase).await;
            match self.deliver(entry, &letter).await {
                Ok(()) => {
                    self.store.mark_sent(entry.entry_id)?;
                    metrics::letter_sent();
                    summary.sent += 1;
                }
                Err(e) => {
                    error!("Failed to send letter to {}: {e}", entry.email);
                    metrics::letter_failed();
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Letter run for {date}: {} sent, {} skipped, {} failed",
            summary.sent, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    async fn deliver(&self, entry: &PendingLetter, letter: &LetterContent) -> Result<()> {
        let today = Local::now().date_naive();
        let date_label = today.format("%B %-d, %Y").to_string();
        let html = LetterEmailTemplate {
            recipient_name: &entry.name,
            date: &date_label,
            intro: &letter.intro,
            diary_feedback: &letter.diary_feedback,
            phrase_feedback: &letter.phrase_feedback,
            outro: &letter.outro,
        }
        .render()?;

        match &self.mailer {
            Some(mailer) => {
                let subject = format!("{} — {date_label}", self.config.subject_prefix);
                mailer
                    .send_html(&entry.email, &entry.name, &subject, html)
                    .await
            }
            None => {
                warn!(
                    "SMTP not configured; dry-run letter for {} ({} chars of HTML)",
                    entry.email,
                    html.len()
                );
                Ok(())
            }
        }
    }

    /// Daemon loop: checks once a minute, fires the job for yesterday when
    /// the configured local send time passes. The `sent_at` flag makes an
    /// extra firing harmless.
    pub async fn run_daemon(&self) -> Result<()> {
        let send_time = NaiveTime::from_hms_opt(self.config.send_hour, self.config.send_minute, 0)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        info!("Letter daemon started, sending daily at {send_time}");

        let mut last_run: Option<NaiveDate> = None;
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let now = Local::now();
            let today = now.date_naive();
            if now.time() < send_time || last_run == Some(today) {
                continue;
            }
            last_run = Some(today);
            let target = today - Duration::days(1);
            if let Err(e) = self.run_for_date(target).await {
                error!("Scheduled letter run failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_letter_quotes_diary_and_phrase() {
        let letter = fallback_letter(
            "Walked along the river and thought about work for a long time.",
            "The days are long but the years are short.",
        );
        assert!(letter.diary_feedback.contains("Walked along the river"));
        assert!(letter
            .phrase_feedback
            .contains("The days are long but the years are short."));
    }

    #[test]
    fn fallback_excerpt_respects_character_boundaries() {
        let long_entry = "감정을 오래 들여다본 하루였다. ".repeat(20);
        let letter = fallback_letter(&long_entry, "phrase");
        // 50 chars of a multibyte string must not split a codepoint.
        assert!(letter.diary_feedback.contains('감'));
    }

    #[test]
    fn letter_content_round_trips_the_wire_field_names() {
        let json = r#"{
            "intro": "Good morning.",
            "diaryFeedback": "Yesterday sounded full.",
            "phraseFeedback": "That phrase fits today.",
            "outro": "Go gently."
        }"#;
        let letter: LetterContent = serde_json::from_str(json).unwrap();
        assert_eq!(letter.diary_feedback, "Yesterday sounded full.");
        let back = serde_json::to_value(&letter).unwrap();
        assert!(back.get("phraseFeedback").is_some());
    }

    #[tokio::test]
    async fn run_for_date_is_idempotent() {
        let store = Arc::new(JournalStore::open_in_memory().unwrap());
        let user_id = store.upsert_user("mina@example.com", "Mina").unwrap();
        store
            .add_phrase(user_id, "Begin again, quietly.", None)
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store
            .upsert_diary(user_id, date, "A slow, good day.", None)
            .unwrap();

        // No model, no SMTP: fallback letter, dry-run delivery.
        let service = LetterService::new(store, None, None, LettersConfig::default());

        let first = service.run_for_date(date).await.unwrap();
        assert_eq!(first.sent, 1);
        let second = service.run_for_date(date).await.unwrap();
        assert_eq!(second.pending, 0);
        assert_eq!(second.sent, 0);
    }

    #[tokio::test]
    async fn users_without_phrases_are_skipped() {
        let store = Arc::new(JournalStore::open_in_memory().unwrap());
        let user_id = store.upsert_user("june@example.com", "June").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store
            .upsert_diary(user_id, date, "Nothing much happened.", None)
            .unwrap();

        let service = LetterService::new(store.clone(), None, None, LettersConfig::default());
        let summary = service.run_for_date(date).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.sent, 0);
        // Still pending: a skip must not consume the entry.
        assert_eq!(store.pending_for_date(date).unwrap().len(), 1);
    }
}
