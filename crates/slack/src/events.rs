use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    ReactionAdded(ReactionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    ReactionAdded,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub user_id: String,
    pub text: String,
    pub from_bot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub channel_id: String,
    /// Timestamp of the message the reaction landed on.
    pub target_ts: String,
    pub reaction: String,
    pub actor_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message handler failure: {0}")]
    Message(String),
    #[error("reaction handler failure: {0}")]
    Reaction(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// Why a message event produced no link flow at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    FromBot,
    NoChannelJoined,
    WrongChannel,
    NoUrls,
}

/// Terminal state of one URL's flow through summarize → reply → annotate →
/// index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlOutcome {
    Indexed { url: String, section_id: String },
    SummarizeFailed { url: String },
    ReplyFailed { url: String },
    AnnotateFailed { url: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    Skipped(SkipReason),
    Processed(Vec<UrlOutcome>),
}

/// Terminal state of the reaction-driven undo machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReactionOutcome {
    TargetNotFound,
    NotBotMessage,
    Acknowledged,
    UnrecognizedReaction,
    NotOriginalPoster,
    CannotUndo,
    Retracted { section_id: String },
    DeleteFailed,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageEventHandler::new(NoopMessageFlowService));
    dispatcher.register(ReactionEventHandler::new(NoopReactionFlowService));
    dispatcher
}

/// Link flow entry point for channel messages.
#[async_trait]
pub trait MessageFlowService: Send + Sync {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<MessageOutcome, EventHandlerError>;
}

pub struct MessageEventHandler<S> {
    service: S,
}

impl<S> MessageEventHandler<S>
where
    S: MessageFlowService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageEventHandler<S>
where
    S: MessageFlowService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.service.handle_message(event, ctx).await? {
            MessageOutcome::Skipped(_) => HandlerResult::Ignored,
            MessageOutcome::Processed(_) => HandlerResult::Processed,
        })
    }
}

/// No joined channel, so every message is skipped. Stands in until the real
/// link flow is wired at bootstrap.
pub struct NoopMessageFlowService;

#[async_trait]
impl MessageFlowService for NoopMessageFlowService {
    async fn handle_message(
        &self,
        _event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<MessageOutcome, EventHandlerError> {
        Ok(MessageOutcome::Skipped(SkipReason::NoChannelJoined))
    }
}

/// Undo machine entry point for reactions.
#[async_trait]
pub trait ReactionFlowService: Send + Sync {
    async fn handle_reaction(
        &self,
        event: &ReactionEvent,
        ctx: &EventContext,
    ) -> Result<ReactionOutcome, EventHandlerError>;
}

pub struct ReactionEventHandler<S> {
    service: S,
}

impl<S> ReactionEventHandler<S>
where
    S: ReactionFlowService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ReactionEventHandler<S>
where
    S: ReactionFlowService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.service.handle_reaction(event, ctx).await? {
            ReactionOutcome::Acknowledged
            | ReactionOutcome::CannotUndo
            | ReactionOutcome::Retracted { .. }
            | ReactionOutcome::DeleteFailed => HandlerResult::Processed,
            ReactionOutcome::TargetNotFound
            | ReactionOutcome::NotBotMessage
            | ReactionOutcome::UnrecognizedReaction
            | ReactionOutcome::NotOriginalPoster => HandlerResult::Ignored,
        })
    }
}

pub struct NoopReactionFlowService;

#[async_trait]
impl ReactionFlowService for NoopReactionFlowService {
    async fn handle_reaction(
        &self,
        _event: &ReactionEvent,
        _ctx: &EventContext,
    ) -> Result<ReactionOutcome, EventHandlerError> {
        Ok(ReactionOutcome::TargetNotFound)
    }
}
