use crate::document::{ContractMetadata, Document};
use crate::gemini::TextGenerator;
use crate::index::{ContractId, ContractIndex};
use anyhow::Result;
use log::{info, warn};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Chunks retrieved to answer one question
pub const ANSWER_CONTEXT_CHUNKS: usize = 5;
/// Separator placed between retrieved chunks in the prompt
const CHUNK_SEPARATOR: &str = "\n\n---\n\n";
pub const NO_RELEVANT_INFORMATION: &str =
    "I couldn't find relevant information in the contracts to answer this question.";

/// What a question is mainly about, used to steer the answer prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Dates,
    Payments,
    Parties,
    General,
}

impl QuestionKind {
    const DATE_WORDS: &'static [&'static str] =
        &["date", "when", "deadline", "expir", "start", "end", "term"];
    const PAYMENT_WORDS: &'static [&'static str] =
        &["pay", "cost", "fee", "price", "amount", "value"];
    const PARTY_WORDS: &'static [&'static str] = &["who", "party", "parties", "vendor", "client"];

    /// Classify a question; dates win over payments, payments over parties
    pub fn detect(question: &str) -> Self {
        let question = question.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|word| question.contains(word));

        if mentions(Self::DATE_WORDS) {
            QuestionKind::Dates
        } else if mentions(Self::PAYMENT_WORDS) {
            QuestionKind::Payments
        } else if mentions(Self::PARTY_WORDS) {
            QuestionKind::Parties
        } else {
            QuestionKind::General
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            QuestionKind::Dates => {
                "The user is asking about dates. List every relevant date in the excerpts \
                 (effective, execution, start, end, termination, renewal), normalize their format \
                 and explain what each date means for the contract."
            }
            QuestionKind::Payments => {
                "The user is asking about payments. Give the total contract value and payment \
                 amounts, the payment frequency, the payment terms (e.g. Net 30) and any penalties \
                 or late fees."
            }
            QuestionKind::Parties => {
                "The user is asking about the parties. Identify Party A and Party B with company \
                 names, locations where available, and their roles (client, vendor, provider)."
            }
            QuestionKind::General => "",
        }
    }
}

/// Build the answer prompt from retrieved chunks
pub fn build_answer_prompt(question: &str, chunks: &[String]) -> String {
    let context = chunks.join(CHUNK_SEPARATOR);
    let instructions = QuestionKind::detect(question).instructions();

    format!(
        r#"You are a helpful contract management assistant with expertise in contract analysis.
Answer the user's question accurately and completely from the contract excerpts below.
{}

Guidelines:
- Extract all relevant information from the excerpts
- Use bullet points when listing several items
- Quote the contract where appropriate
- If the excerpts do not contain the answer, say so clearly
- Be precise with dates, amounts and names

Contract Excerpts:
{}

User Question: {}

Answer:"#,
        instructions, context, question
    )
}

/// RAG (Retrieval-Augmented Generation) engine over indexed contracts
pub struct RagEngine<G> {
    index: Arc<ContractIndex>,
    generator: G,
}

impl<G: TextGenerator> RagEngine<G> {
    /// Create a new RAG engine around a shared index
    pub fn new(index: Arc<ContractIndex>, generator: G) -> Self {
        RagEngine { index, generator }
    }

    pub fn index(&self) -> &ContractIndex {
        &self.index
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Read a contract file and index it.
    ///
    /// Missing, unreadable or too short files are skipped with a warning;
    /// returns whether the contract was indexed.
    pub fn load_contract_from_file<P: AsRef<Path>>(
        &self,
        id: ContractId,
        file_path: P,
        metadata: ContractMetadata,
    ) -> bool {
        let path = file_path.as_ref();
        if !path.exists() {
            warn!("Contract file not found: {}", path.display());
            return false;
        }

        let document = match Document::from_file(path) {
            Ok(document) => document,
            Err(e) => {
                warn!("Failed to load contract {}: {:#}", id, e);
                return false;
            }
        };

        if !document.is_substantial() {
            warn!("Contract file is empty or too short: {}", path.display());
            return false;
        }

        let label = metadata
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string());
        self.index.add_document(id, document.content, metadata);
        info!("Loaded contract {} from {}", label, document.file_name);

        true
    }

    /// Answer a question from the contracts, optionally restricted to one
    pub async fn answer_question(&self, question: &str, contract_id: Option<ContractId>) -> Result<String> {
        let chunks = self
            .index
            .query(question, ANSWER_CONTEXT_CHUNKS, contract_id);

        if chunks.is_empty() {
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }

        let prompt = build_answer_prompt(question, &chunks);
        self.generator.generate(&prompt).await
    }

    /// Run the interactive question loop until the user types `exit`
    pub async fn run_query_loop(&self, contract_id: Option<ContractId>) -> Result<()> {
        match contract_id {
            Some(id) => info!("Ready to answer questions about contract {}. Type 'exit' to quit.", id),
            None => info!(
                "Ready to answer questions about {} contracts. Type 'exit' to quit.",
                self.index.len()
            ),
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") {
                info!("Goodbye!");
                break;
            }

            let answer = self.answer_question(question, contract_id).await?;
            println!("\n{}", answer);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkConfig;
    use std::sync::Mutex;
    use tempfile::Builder;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("generated answer".to_string())
        }
    }

    fn engine() -> RagEngine<RecordingGenerator> {
        let index = Arc::new(ContractIndex::new(ChunkConfig::new(60, 10).unwrap()));
        RagEngine::new(index, RecordingGenerator::default())
    }

    const CONTRACT: &str = "SERVICES AGREEMENT between Acme Corp (Client) and Globex Ltd (Vendor). \
        Payment of the monthly fee is due within 30 days of invoice. \
        Either party may terminate on 90 days written notice or immediately upon material breach.";

    #[test]
    fn test_detect_question_kind() {
        assert_eq!(QuestionKind::detect("When does it expire?"), QuestionKind::Dates);
        assert_eq!(QuestionKind::detect("How much is the fee?"), QuestionKind::Payments);
        assert_eq!(QuestionKind::detect("Who is the supplier?"), QuestionKind::Parties);
        assert_eq!(QuestionKind::detect("Is there an SLA?"), QuestionKind::General);
        // Date words take precedence, matched as substrings
        assert_eq!(QuestionKind::detect("When is payment due?"), QuestionKind::Dates);
        assert_eq!(QuestionKind::detect("Who is the vendor?"), QuestionKind::Dates);
    }

    #[test]
    fn test_answer_prompt_joins_chunks() {
        let chunks = vec!["first excerpt".to_string(), "second excerpt".to_string()];
        let prompt = build_answer_prompt("What is the price?", &chunks);
        assert!(prompt.contains("first excerpt\n\n---\n\nsecond excerpt"));
        assert!(prompt.contains("User Question: What is the price?"));
        assert!(prompt.contains("asking about payments"));
    }

    #[tokio::test]
    async fn test_answer_question_sends_retrieved_chunks() {
        let engine = engine();
        engine
            .index()
            .add_document(1, CONTRACT, ContractMetadata::named("MSA"));

        let answer = engine
            .answer_question("What is the payment schedule?", Some(1))
            .await
            .unwrap();
        assert_eq!(answer, "generated answer");

        let prompts = engine.generator().prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("monthly fee"));
    }

    #[tokio::test]
    async fn test_answer_question_without_contracts() {
        let engine = engine();
        let answer = engine.answer_question("Who are the parties?", None).await.unwrap();
        assert_eq!(answer, NO_RELEVANT_INFORMATION);

        let answer = engine.answer_question("Who are the parties?", Some(42)).await.unwrap();
        assert_eq!(answer, NO_RELEVANT_INFORMATION);
        assert!(engine.generator().prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_load_contract_from_file() {
        let engine = engine();
        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(CONTRACT.as_bytes()).unwrap();

        assert!(engine.load_contract_from_file(5, file.path(), ContractMetadata::named("MSA")));
        let stored = engine.index().get(5).unwrap();
        assert_eq!(stored.text, CONTRACT);
        assert!(stored.chunks.len() > 1);
    }

    #[test]
    fn test_load_skips_short_and_missing_files() {
        let engine = engine();
        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"Too short to be a contract.").unwrap();

        assert!(!engine.load_contract_from_file(1, file.path(), ContractMetadata::default()));
        assert!(!engine.load_contract_from_file(2, "/no/such/contract.txt", ContractMetadata::default()));
        assert!(engine.index().is_empty());
    }
}
