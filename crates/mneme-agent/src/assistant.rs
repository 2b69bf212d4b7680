//! The turn loop: analyze, retrieve, respond, remember.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use mneme_llm::SharedOracle;
use mneme_memory::{
    ChatMessage, ConceptManager, ConversationStore, HookExtractor, MemoryRecord, MemoryStore,
    Relevancer,
};

use crate::concepts::ConceptIndexer;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::prompt::{ProcessedPrompt, PromptAnalyzer};
use crate::responder::ResponseGenerator;
use crate::summarizer::Summarizer;
use crate::updater::{MemoryUpdater, UpdateReport};

/// Everything one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub response: String,
    pub prompt: ProcessedPrompt,
    /// Memories shown to the oracle, in rank order.
    pub memories_used: Vec<MemoryRecord>,
    pub update: UpdateReport,
    /// Concepts touched by indexing, empty when indexing is off.
    pub concepts: Vec<String>,
}

/// A memory-backed conversational assistant.
pub struct Assistant {
    store: Arc<MemoryStore>,
    conversations: Arc<ConversationStore>,
    analyzer: PromptAnalyzer,
    relevancer: Relevancer,
    responder: ResponseGenerator,
    updater: MemoryUpdater,
    concepts: ConceptIndexer,
    index_concepts: bool,
}

impl Assistant {
    /// Open file-backed stores under `data_dir`.
    pub fn open(data_dir: &Path, oracle: SharedOracle, config: AgentConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::open(data_dir, config.store)?);
        let concepts = Arc::new(ConceptManager::open(&data_dir.join("concepts"))?);
        let conversations = Arc::new(ConversationStore::open(&data_dir.join("conversations"))?);
        Ok(Self::from_parts(store, concepts, conversations, oracle, config))
    }

    /// Volatile stores, for tests and dry runs.
    pub fn in_memory(oracle: SharedOracle, config: AgentConfig) -> Self {
        Self::from_parts(
            Arc::new(MemoryStore::in_memory(config.store)),
            Arc::new(ConceptManager::in_memory()),
            Arc::new(ConversationStore::in_memory()),
            oracle,
            config,
        )
    }

    pub fn from_parts(
        store: Arc<MemoryStore>,
        concepts: Arc<ConceptManager>,
        conversations: Arc<ConversationStore>,
        oracle: SharedOracle,
        config: AgentConfig,
    ) -> Self {
        let extractor = HookExtractor::new(config.hooks).with_oracle(oracle.clone());
        let relevancer = Relevancer::new(store.clone(), extractor.clone(), config.relevance)
            .with_oracle(oracle.clone());
        let summarizer =
            Summarizer::new(config.summary_max_length).with_oracle(oracle.clone());
        let updater = MemoryUpdater::new(store.clone(), extractor.clone(), summarizer)
            .with_oracle(oracle.clone());

        Self {
            store,
            conversations,
            analyzer: PromptAnalyzer::new().with_oracle(oracle.clone()),
            relevancer,
            responder: ResponseGenerator::new(oracle.clone()),
            updater,
            concepts: ConceptIndexer::new(concepts, extractor, oracle, config.concept),
            index_concepts: config.index_concepts,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn concepts(&self) -> &ConceptIndexer {
        &self.concepts
    }

    pub fn relevancer(&self) -> &Relevancer {
        &self.relevancer
    }

    pub fn analyzer(&self) -> &PromptAnalyzer {
        &self.analyzer
    }

    /// Run one turn. Only storage failures on the transcript are errors;
    /// oracle and memory-write problems degrade inside the outcome.
    pub async fn handle_turn(
        &self,
        conversation_id: Option<&str>,
        input: &str,
    ) -> Result<TurnOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AgentError::invalid_input("empty message"));
        }

        let prompt = self.analyzer.analyze(input).await;
        let memories = self.relevancer.retrieve(input, &prompt.hints()).await;
        let response = self.responder.generate(input, &memories).await;

        let conversation_id = self.append_exchange(conversation_id, input, &response)?;
        let update = self
            .updater
            .record_interaction(input, &response, Some(&conversation_id))
            .await;

        let concepts = if self.index_concepts {
            let interaction = format!("User: {input}\n\nAssistant: {response}");
            self.concepts
                .process_memory(&interaction, update.episodic_id.as_deref())
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Concept indexing failed");
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        info!(
            conversation = %conversation_id,
            memories = memories.len(),
            facts = update.facts_stored.len(),
            "Turn complete"
        );
        Ok(TurnOutcome {
            conversation_id,
            response,
            prompt,
            memories_used: memories,
            update,
            concepts,
        })
    }

    /// Append both sides of the exchange, starting a conversation when the
    /// id is absent or unknown.
    fn append_exchange(
        &self,
        conversation_id: Option<&str>,
        input: &str,
        response: &str,
    ) -> Result<String> {
        let existing = match conversation_id {
            Some(id) => self.conversations.get(id)?,
            None => None,
        };
        let id = match existing {
            Some(conversation) => {
                self.conversations
                    .add_message(&conversation.id, ChatMessage::user(input))?;
                conversation.id
            }
            None => {
                if let Some(id) = conversation_id {
                    warn!(id = %id, "Unknown conversation, starting a new one");
                }
                self.conversations.create(ChatMessage::user(input))?.id
            }
        };
        self.conversations
            .add_message(&id, ChatMessage::assistant(response))?;
        Ok(id)
    }
}
