use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use linkboard_core::errors::{
    AnnotationStage, FlowError, CANVAS_REMOVE_APOLOGY, SAVED_CONFIRMATION,
};
use linkboard_core::index::ThreadSectionIndex;
use linkboard_core::render::TemplateEngine;
use linkboard_core::summarize::Summarizer;
use linkboard_core::urls::extract_urls;

use crate::api::ChatGateway;
use crate::canvas::CanvasAnnotator;
use crate::events::{
    EventContext, EventHandlerError, MessageEvent, MessageFlowService, MessageOutcome,
    ReactionEvent, ReactionFlowService, ReactionOutcome, SkipReason, UrlOutcome,
};

pub const POSITIVE_REACTION: &str = "+1";
pub const NEGATIVE_REACTION: &str = "-1";

/// The link flow for one channel message: extract URLs, then for each URL in
/// source order summarize, reply in thread, pin to the canvas, and index the
/// section under the message's own timestamp. One URL's failure posts an
/// apology and moves on; the message as a whole is never aborted.
pub struct LinkMessageService {
    channel_id: Option<String>,
    summarizer: Arc<dyn Summarizer>,
    chat: Arc<dyn ChatGateway>,
    annotator: CanvasAnnotator,
    index: Arc<ThreadSectionIndex>,
    templates: TemplateEngine,
}

impl LinkMessageService {
    pub fn new(
        channel_id: Option<String>,
        summarizer: Arc<dyn Summarizer>,
        chat: Arc<dyn ChatGateway>,
        annotator: CanvasAnnotator,
        index: Arc<ThreadSectionIndex>,
        templates: TemplateEngine,
    ) -> Self {
        Self { channel_id, summarizer, chat, annotator, index, templates }
    }

    fn skip_reason(&self, event: &MessageEvent) -> Option<SkipReason> {
        if event.from_bot {
            return Some(SkipReason::FromBot);
        }
        match &self.channel_id {
            None => Some(SkipReason::NoChannelJoined),
            Some(channel_id) if *channel_id != event.channel_id => Some(SkipReason::WrongChannel),
            Some(_) => None,
        }
    }

    async fn post_best_effort(&self, event: &MessageEvent, text: &str, ctx: &EventContext) {
        if let Err(error) = self.chat.post_in_thread(&event.channel_id, &event.ts, text).await {
            warn!(
                event_name = "link.reply.failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                thread_id = %event.ts,
                error = %error,
                "could not post thread reply"
            );
        }
    }

    async fn report_failure(&self, event: &MessageEvent, failure: &FlowError, ctx: &EventContext) {
        warn!(
            event_name = "link.flow.failed",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_id = %event.ts,
            url = %failure.url(),
            error = %failure,
            "link flow failed; continuing with next url"
        );
        self.post_best_effort(event, failure.user_apology(), ctx).await;
    }

    /// Runs one URL to its terminal state.
    async fn process_url(
        &self,
        event: &MessageEvent,
        url: &str,
        ctx: &EventContext,
    ) -> UrlOutcome {
        info!(
            event_name = "link.summarize.start",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_id = %event.ts,
            url = %url,
            "summarizing shared link"
        );

        let summary = match self.summarizer.summarize(url).await {
            Ok(summary) => summary,
            Err(error) => {
                let failure = FlowError::Summarization {
                    url: url.to_owned(),
                    detail: error.to_string(),
                };
                self.report_failure(event, &failure, ctx).await;
                return UrlOutcome::SummarizeFailed { url: url.to_owned() };
            }
        };

        // The summary reply leads; the canvas entry follows and is never
        // rolled back if the reply already went out.
        if let Err(error) = self.chat.post_in_thread(&event.channel_id, &event.ts, &summary).await
        {
            warn!(
                event_name = "link.reply.failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                thread_id = %event.ts,
                url = %url,
                error = %error,
                "could not post summary reply; skipping canvas entry for this url"
            );
            return UrlOutcome::ReplyFailed { url: url.to_owned() };
        }

        let markdown =
            match self.templates.render_canvas_section(url, &event.user_id, &summary) {
                Ok(markdown) => markdown,
                Err(error) => {
                    let failure = FlowError::Annotation {
                        url: url.to_owned(),
                        stage: AnnotationStage::Render,
                        detail: error.to_string(),
                    };
                    self.report_failure(event, &failure, ctx).await;
                    return UrlOutcome::AnnotateFailed { url: url.to_owned() };
                }
            };

        let section_id = match self.annotator.insert(&markdown).await {
            Ok(section_id) => section_id,
            Err(error) => {
                let failure = FlowError::Annotation {
                    url: url.to_owned(),
                    stage: AnnotationStage::Append,
                    detail: error.to_string(),
                };
                self.report_failure(event, &failure, ctx).await;
                return UrlOutcome::AnnotateFailed { url: url.to_owned() };
            }
        };

        // The triggering message's own timestamp acts as the thread root; a
        // later url in the same message overwrites this entry.
        self.index.record(&event.ts, &section_id);
        info!(
            event_name = "link.canvas.inserted",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_id = %event.ts,
            url = %url,
            section_id = %section_id,
            "canvas entry recorded"
        );
        self.post_best_effort(event, SAVED_CONFIRMATION, ctx).await;

        UrlOutcome::Indexed { url: url.to_owned(), section_id }
    }
}

#[async_trait]
impl MessageFlowService for LinkMessageService {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<MessageOutcome, EventHandlerError> {
        if let Some(reason) = self.skip_reason(event) {
            return Ok(MessageOutcome::Skipped(reason));
        }

        let urls = extract_urls(&event.text);
        if urls.is_empty() {
            return Ok(MessageOutcome::Skipped(SkipReason::NoUrls));
        }

        info!(
            event_name = "link.message.received",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_id = %event.ts,
            url_count = urls.len(),
            "message with links received"
        );

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in &urls {
            outcomes.push(self.process_url(event, url, ctx).await);
        }

        Ok(MessageOutcome::Processed(outcomes))
    }
}

/// The reaction-driven undo machine: resolve the reacted-to message, the
/// thread root, and the original poster, then retract the indexed canvas
/// section when a qualifying 👎 arrives.
pub struct ReactionUndoService {
    chat: Arc<dyn ChatGateway>,
    annotator: CanvasAnnotator,
    index: Arc<ThreadSectionIndex>,
}

impl ReactionUndoService {
    pub fn new(
        chat: Arc<dyn ChatGateway>,
        annotator: CanvasAnnotator,
        index: Arc<ThreadSectionIndex>,
    ) -> Self {
        Self { chat, annotator, index }
    }
}

#[async_trait]
impl ReactionFlowService for ReactionUndoService {
    async fn handle_reaction(
        &self,
        event: &ReactionEvent,
        ctx: &EventContext,
    ) -> Result<ReactionOutcome, EventHandlerError> {
        let targets = self
            .chat
            .fetch_replies(&event.channel_id, &event.target_ts, 1)
            .await
            .map_err(|error| {
                EventHandlerError::Reaction(format!("target resolution failed: {error}"))
            })?;

        let Some(target) = targets.first() else {
            info!(
                event_name = "link.undo.target_missing",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                target_ts = %event.target_ts,
                "could not resolve the reacted-to message"
            );
            return Ok(ReactionOutcome::TargetNotFound);
        };

        if !target.is_bot_authored() {
            return Ok(ReactionOutcome::NotBotMessage);
        }

        let thread_root = target.thread_root_ts().to_owned();
        let roots = self
            .chat
            .fetch_replies(&event.channel_id, &thread_root, 1)
            .await
            .map_err(|error| {
                EventHandlerError::Reaction(format!("thread root resolution failed: {error}"))
            })?;

        let Some(original_poster) = roots.first().and_then(|root| root.user_id.clone()) else {
            info!(
                event_name = "link.undo.root_missing",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                thread_id = %thread_root,
                "could not resolve the thread's original poster"
            );
            return Ok(ReactionOutcome::TargetNotFound);
        };

        match event.reaction.as_str() {
            POSITIVE_REACTION => {
                info!(
                    event_name = "link.undo.acknowledged",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    thread_id = %thread_root,
                    actor_id = %event.actor_id,
                    "positive reaction on bot reply"
                );
                Ok(ReactionOutcome::Acknowledged)
            }
            NEGATIVE_REACTION => {
                if event.actor_id != original_poster {
                    info!(
                        event_name = "link.undo.wrong_actor",
                        correlation_id = %ctx.correlation_id,
                        channel_id = %event.channel_id,
                        thread_id = %thread_root,
                        actor_id = %event.actor_id,
                        "negative reaction from someone other than the original poster"
                    );
                    return Ok(ReactionOutcome::NotOriginalPoster);
                }

                let Some(section_id) = self.index.lookup(&thread_root) else {
                    info!(
                        event_name = "link.undo.missing_entry",
                        correlation_id = %ctx.correlation_id,
                        channel_id = %event.channel_id,
                        thread_id = %thread_root,
                        "no indexed canvas section for this thread"
                    );
                    return Ok(ReactionOutcome::CannotUndo);
                };

                match self.annotator.delete(&section_id).await {
                    Ok(()) => {
                        self.index.forget(&thread_root);
                        info!(
                            event_name = "link.undo.retracted",
                            correlation_id = %ctx.correlation_id,
                            channel_id = %event.channel_id,
                            thread_id = %thread_root,
                            section_id = %section_id,
                            "canvas entry retracted"
                        );
                        Ok(ReactionOutcome::Retracted { section_id })
                    }
                    Err(error) => {
                        // The section still exists, so the index entry stays;
                        // a later qualifying reaction can retry the delete.
                        warn!(
                            event_name = "link.undo.delete_failed",
                            correlation_id = %ctx.correlation_id,
                            channel_id = %event.channel_id,
                            thread_id = %thread_root,
                            section_id = %section_id,
                            error = %error,
                            "could not delete canvas section"
                        );
                        if let Err(post_error) = self
                            .chat
                            .post_in_thread(&event.channel_id, &thread_root, CANVAS_REMOVE_APOLOGY)
                            .await
                        {
                            warn!(
                                event_name = "link.reply.failed",
                                correlation_id = %ctx.correlation_id,
                                channel_id = %event.channel_id,
                                thread_id = %thread_root,
                                error = %post_error,
                                "could not post thread reply"
                            );
                        }
                        Ok(ReactionOutcome::DeleteFailed)
                    }
                }
            }
            _ => Ok(ReactionOutcome::UnrecognizedReaction),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use linkboard_core::errors::{CANVAS_APOLOGY, SAVED_CONFIRMATION, SUMMARY_APOLOGY};
    use linkboard_core::index::ThreadSectionIndex;
    use linkboard_core::render::TemplateEngine;
    use linkboard_core::summarize::{SummarizeError, Summarizer};

    use super::{LinkMessageService, ReactionUndoService};
    use crate::api::{ChatGateway, MessageRecord, SlackApiError};
    use crate::canvas::{CanvasAnnotator, CanvasError, CanvasGateway, SectionRef};
    use crate::events::{
        EventContext, MessageEvent, MessageFlowService, MessageOutcome, ReactionEvent,
        ReactionFlowService, ReactionOutcome, SkipReason, UrlOutcome,
    };

    struct ScriptedSummarizer {
        failing_urls: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSummarizer {
        fn new(failing_urls: &[&str]) -> Self {
            Self {
                failing_urls: failing_urls.iter().map(|url| url.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl Summarizer for ScriptedSummarizer {
        async fn summarize(&self, url: &str) -> Result<String, SummarizeError> {
            self.calls.lock().expect("calls lock").push(url.to_owned());
            if self.failing_urls.iter().any(|failing| failing == url) {
                return Err(SummarizeError::Generation {
                    url: url.to_owned(),
                    detail: "boom".to_owned(),
                });
            }
            Ok(format!("summary of {url}"))
        }
    }

    #[derive(Default)]
    struct ScriptedChat {
        posts: Mutex<Vec<(String, String, String)>>,
        replies: Mutex<HashMap<String, Vec<MessageRecord>>>,
        fail_posts: bool,
    }

    impl ScriptedChat {
        fn posts(&self) -> Vec<(String, String, String)> {
            self.posts.lock().expect("posts lock").clone()
        }

        fn posted_texts(&self) -> Vec<String> {
            self.posts().into_iter().map(|(_, _, text)| text).collect()
        }

        fn script_replies(&self, ts: &str, messages: Vec<MessageRecord>) {
            self.replies.lock().expect("replies lock").insert(ts.to_owned(), messages);
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedChat {
        async fn fetch_replies(
            &self,
            _channel_id: &str,
            ts: &str,
            _limit: u32,
        ) -> Result<Vec<MessageRecord>, SlackApiError> {
            Ok(self.replies.lock().expect("replies lock").get(ts).cloned().unwrap_or_default())
        }

        async fn post_in_thread(
            &self,
            channel_id: &str,
            thread_ts: &str,
            text: &str,
        ) -> Result<(), SlackApiError> {
            if self.fail_posts {
                return Err(SlackApiError::Api {
                    method: "chat.postMessage",
                    error: "channel_not_found".to_owned(),
                });
            }
            self.posts.lock().expect("posts lock").push((
                channel_id.to_owned(),
                thread_ts.to_owned(),
                text.to_owned(),
            ));
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedCanvas {
        sections: Mutex<Vec<SectionRef>>,
        appended: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
        fail_append: bool,
        fail_delete: bool,
    }

    impl ScriptedCanvas {
        fn appended(&self) -> Vec<String> {
            self.appended.lock().expect("appended lock").clone()
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().expect("deleted lock").clone()
        }
    }

    #[async_trait]
    impl CanvasGateway for ScriptedCanvas {
        async fn append_section(
            &self,
            _canvas_id: &str,
            markdown: &str,
        ) -> Result<(), CanvasError> {
            if self.fail_append {
                return Err(CanvasError::Api(SlackApiError::Api {
                    method: "canvases.edit",
                    error: "not_allowed".to_owned(),
                }));
            }
            self.appended.lock().expect("appended lock").push(markdown.to_owned());
            let mut sections = self.sections.lock().expect("sections lock");
            let id = format!("sec-{}", sections.len() + 1);
            sections.push(SectionRef { id });
            Ok(())
        }

        async fn list_sections(&self, _canvas_id: &str) -> Result<Vec<SectionRef>, CanvasError> {
            Ok(self.sections.lock().expect("sections lock").clone())
        }

        async fn delete_section(
            &self,
            _canvas_id: &str,
            section_id: &str,
        ) -> Result<(), CanvasError> {
            if self.fail_delete {
                return Err(CanvasError::Api(SlackApiError::Api {
                    method: "canvases.edit",
                    error: "section_not_found".to_owned(),
                }));
            }
            self.deleted.lock().expect("deleted lock").push(section_id.to_owned());
            Ok(())
        }
    }

    struct Harness {
        summarizer: Arc<ScriptedSummarizer>,
        chat: Arc<ScriptedChat>,
        canvas: Arc<ScriptedCanvas>,
        index: Arc<ThreadSectionIndex>,
    }

    impl Harness {
        fn new(failing_urls: &[&str]) -> Self {
            Self {
                summarizer: Arc::new(ScriptedSummarizer::new(failing_urls)),
                chat: Arc::new(ScriptedChat::default()),
                canvas: Arc::new(ScriptedCanvas::default()),
                index: Arc::new(ThreadSectionIndex::new()),
            }
        }

        fn message_service(&self, channel_id: Option<&str>) -> LinkMessageService {
            LinkMessageService::new(
                channel_id.map(str::to_owned),
                self.summarizer.clone(),
                self.chat.clone(),
                CanvasAnnotator::new(self.canvas.clone(), "F0TEST"),
                self.index.clone(),
                TemplateEngine::new("Summarize {{ url }}.").expect("templates"),
            )
        }

        fn reaction_service(&self) -> ReactionUndoService {
            ReactionUndoService::new(
                self.chat.clone(),
                CanvasAnnotator::new(self.canvas.clone(), "F0TEST"),
                self.index.clone(),
            )
        }
    }

    fn message(text: &str) -> MessageEvent {
        MessageEvent {
            channel_id: "C1".to_owned(),
            ts: "1730000000.1000".to_owned(),
            thread_ts: None,
            user_id: "U1".to_owned(),
            text: text.to_owned(),
            from_bot: false,
        }
    }

    fn reaction(name: &str, actor: &str) -> ReactionEvent {
        ReactionEvent {
            channel_id: "C1".to_owned(),
            target_ts: "1730000000.2000".to_owned(),
            reaction: name.to_owned(),
            actor_id: actor.to_owned(),
        }
    }

    /// Scripts the bot reply at the reaction target and the human root
    /// message above it.
    fn script_thread(chat: &ScriptedChat, root_user: &str) {
        chat.script_replies(
            "1730000000.2000",
            vec![MessageRecord {
                ts: "1730000000.2000".to_owned(),
                thread_ts: Some("1730000000.1000".to_owned()),
                user_id: None,
                bot_id: Some("B1".to_owned()),
                text: "summary of https://example.com/a".to_owned(),
            }],
        );
        chat.script_replies(
            "1730000000.1000",
            vec![MessageRecord {
                ts: "1730000000.1000".to_owned(),
                thread_ts: None,
                user_id: Some(root_user.to_owned()),
                bot_id: None,
                text: "check this out https://example.com/a".to_owned(),
            }],
        );
    }

    #[tokio::test]
    async fn two_urls_process_in_order_and_index_keeps_the_last_section() {
        let harness = Harness::new(&[]);
        let service = harness.message_service(Some("C1"));
        let event = message("check this out https://example.com/a and https://example.com/b");

        let outcome =
            service.handle_message(&event, &EventContext::default()).await.expect("outcome");

        assert_eq!(
            harness.summarizer.calls(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(harness.canvas.appended().len(), 2);
        assert!(harness.canvas.appended()[0].contains("https://example.com/a"));
        assert!(harness.canvas.appended()[1].contains("https://example.com/b"));

        // Both urls recorded under the message's own ts; the later call wins.
        assert_eq!(harness.index.lookup("1730000000.1000").as_deref(), Some("sec-2"));
        assert_eq!(harness.index.len(), 1);

        let MessageOutcome::Processed(outcomes) = outcome else {
            panic!("expected processed outcome");
        };
        assert_eq!(
            outcomes,
            vec![
                UrlOutcome::Indexed {
                    url: "https://example.com/a".to_owned(),
                    section_id: "sec-1".to_owned(),
                },
                UrlOutcome::Indexed {
                    url: "https://example.com/b".to_owned(),
                    section_id: "sec-2".to_owned(),
                },
            ]
        );

        // Each url posts its summary and a saved confirmation, in thread.
        let texts = harness.chat.posted_texts();
        assert_eq!(
            texts,
            vec![
                "summary of https://example.com/a".to_owned(),
                SAVED_CONFIRMATION.to_owned(),
                "summary of https://example.com/b".to_owned(),
                SAVED_CONFIRMATION.to_owned(),
            ]
        );
        assert!(harness.chat.posts().iter().all(|(_, thread, _)| thread == "1730000000.1000"));
    }

    #[tokio::test]
    async fn message_without_urls_triggers_no_external_calls() {
        let harness = Harness::new(&[]);
        let service = harness.message_service(Some("C1"));

        let outcome = service
            .handle_message(&message("no links here"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, MessageOutcome::Skipped(SkipReason::NoUrls));
        assert!(harness.summarizer.calls().is_empty());
        assert!(harness.chat.posts().is_empty());
        assert!(harness.canvas.appended().is_empty());
    }

    #[tokio::test]
    async fn bot_messages_and_foreign_channels_are_skipped() {
        let harness = Harness::new(&[]);
        let service = harness.message_service(Some("C1"));

        let mut from_bot = message("https://example.com");
        from_bot.from_bot = true;
        let outcome =
            service.handle_message(&from_bot, &EventContext::default()).await.expect("outcome");
        assert_eq!(outcome, MessageOutcome::Skipped(SkipReason::FromBot));

        let mut elsewhere = message("https://example.com");
        elsewhere.channel_id = "C9".to_owned();
        let outcome =
            service.handle_message(&elsewhere, &EventContext::default()).await.expect("outcome");
        assert_eq!(outcome, MessageOutcome::Skipped(SkipReason::WrongChannel));

        let unjoined = harness.message_service(None);
        let outcome = unjoined
            .handle_message(&message("https://example.com"), &EventContext::default())
            .await
            .expect("outcome");
        assert_eq!(outcome, MessageOutcome::Skipped(SkipReason::NoChannelJoined));

        assert!(harness.summarizer.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_summarization_apologizes_and_siblings_continue() {
        let harness = Harness::new(&["https://bad.example"]);
        let service = harness.message_service(Some("C1"));
        let event = message("first https://bad.example then https://example.com/ok");

        let outcome =
            service.handle_message(&event, &EventContext::default()).await.expect("outcome");

        let MessageOutcome::Processed(outcomes) = outcome else {
            panic!("expected processed outcome");
        };
        assert_eq!(
            outcomes[0],
            UrlOutcome::SummarizeFailed { url: "https://bad.example".to_owned() }
        );
        assert!(matches!(outcomes[1], UrlOutcome::Indexed { .. }));

        // The failed url posts only the apology and never touches the canvas.
        let texts = harness.chat.posted_texts();
        assert_eq!(texts[0], SUMMARY_APOLOGY);
        assert_eq!(harness.canvas.appended().len(), 1);
        assert!(harness.canvas.appended()[0].contains("https://example.com/ok"));
        assert_eq!(harness.index.lookup("1730000000.1000").as_deref(), Some("sec-1"));
    }

    #[tokio::test]
    async fn failed_append_keeps_the_summary_reply_and_skips_indexing() {
        let harness = Harness::new(&[]);
        let canvas = Arc::new(ScriptedCanvas { fail_append: true, ..Default::default() });
        let service = LinkMessageService::new(
            Some("C1".to_owned()),
            harness.summarizer.clone(),
            harness.chat.clone(),
            CanvasAnnotator::new(canvas, "F0TEST"),
            harness.index.clone(),
            TemplateEngine::new("Summarize {{ url }}.").expect("templates"),
        );

        let outcome = service
            .handle_message(&message("https://example.com"), &EventContext::default())
            .await
            .expect("outcome");

        let MessageOutcome::Processed(outcomes) = outcome else {
            panic!("expected processed outcome");
        };
        assert_eq!(
            outcomes,
            vec![UrlOutcome::AnnotateFailed { url: "https://example.com".to_owned() }]
        );

        let texts = harness.chat.posted_texts();
        assert_eq!(texts, vec!["summary of https://example.com".to_owned(), CANVAS_APOLOGY.to_owned()]);
        assert!(harness.index.is_empty());
    }

    #[tokio::test]
    async fn failed_reply_skips_the_canvas_for_that_url() {
        let harness = Harness::new(&[]);
        let chat = Arc::new(ScriptedChat { fail_posts: true, ..Default::default() });
        let service = LinkMessageService::new(
            Some("C1".to_owned()),
            harness.summarizer.clone(),
            chat,
            CanvasAnnotator::new(harness.canvas.clone(), "F0TEST"),
            harness.index.clone(),
            TemplateEngine::new("Summarize {{ url }}.").expect("templates"),
        );

        let outcome = service
            .handle_message(&message("https://example.com"), &EventContext::default())
            .await
            .expect("outcome");

        let MessageOutcome::Processed(outcomes) = outcome else {
            panic!("expected processed outcome");
        };
        assert_eq!(
            outcomes,
            vec![UrlOutcome::ReplyFailed { url: "https://example.com".to_owned() }]
        );
        assert!(harness.canvas.appended().is_empty());
        assert!(harness.index.is_empty());
    }

    #[tokio::test]
    async fn original_poster_thumbs_down_retracts_the_indexed_section() {
        let harness = Harness::new(&[]);
        harness.index.record("1730000000.1000", "sec-1");
        script_thread(&harness.chat, "U1");

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("-1", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::Retracted { section_id: "sec-1".to_owned() });
        assert_eq!(harness.canvas.deleted(), vec!["sec-1"]);
        assert_eq!(harness.index.lookup("1730000000.1000"), None);
    }

    #[tokio::test]
    async fn thumbs_down_from_someone_else_changes_nothing() {
        let harness = Harness::new(&[]);
        harness.index.record("1730000000.1000", "sec-1");
        script_thread(&harness.chat, "U1");

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("-1", "U2"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::NotOriginalPoster);
        assert!(harness.canvas.deleted().is_empty());
        assert_eq!(harness.index.lookup("1730000000.1000").as_deref(), Some("sec-1"));
    }

    #[tokio::test]
    async fn reactions_on_human_messages_are_ignored() {
        let harness = Harness::new(&[]);
        harness.chat.script_replies(
            "1730000000.2000",
            vec![MessageRecord {
                ts: "1730000000.2000".to_owned(),
                thread_ts: Some("1730000000.1000".to_owned()),
                user_id: Some("U3".to_owned()),
                bot_id: None,
                text: "a human reply".to_owned(),
            }],
        );

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("-1", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::NotBotMessage);
        assert!(harness.canvas.deleted().is_empty());
    }

    #[tokio::test]
    async fn thumbs_up_acknowledges_without_side_effects() {
        let harness = Harness::new(&[]);
        harness.index.record("1730000000.1000", "sec-1");
        script_thread(&harness.chat, "U1");

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("+1", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::Acknowledged);
        assert!(harness.canvas.deleted().is_empty());
        assert_eq!(harness.index.lookup("1730000000.1000").as_deref(), Some("sec-1"));
    }

    #[tokio::test]
    async fn thumbs_down_without_an_indexed_entry_cannot_undo() {
        let harness = Harness::new(&[]);
        script_thread(&harness.chat, "U1");

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("-1", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::CannotUndo);
        assert!(harness.canvas.deleted().is_empty());
        // No user-facing message for a lookup miss.
        assert!(harness.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_index_entry_and_apologizes() {
        let harness = Harness::new(&[]);
        harness.index.record("1730000000.1000", "sec-1");
        script_thread(&harness.chat, "U1");
        let canvas = Arc::new(ScriptedCanvas { fail_delete: true, ..Default::default() });
        let service = ReactionUndoService::new(
            harness.chat.clone(),
            CanvasAnnotator::new(canvas, "F0TEST"),
            harness.index.clone(),
        );

        let outcome = service
            .handle_reaction(&reaction("-1", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::DeleteFailed);
        assert_eq!(harness.index.lookup("1730000000.1000").as_deref(), Some("sec-1"));
        let texts = harness.chat.posted_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Canvas"));
    }

    #[tokio::test]
    async fn unknown_reactions_are_ignored() {
        let harness = Harness::new(&[]);
        script_thread(&harness.chat, "U1");

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("eyes", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::UnrecognizedReaction);
    }

    #[tokio::test]
    async fn unresolvable_reaction_target_is_reported_without_side_effects() {
        let harness = Harness::new(&[]);

        let outcome = harness
            .reaction_service()
            .handle_reaction(&reaction("-1", "U1"), &EventContext::default())
            .await
            .expect("outcome");

        assert_eq!(outcome, ReactionOutcome::TargetNotFound);
        assert!(harness.canvas.deleted().is_empty());
    }
}
