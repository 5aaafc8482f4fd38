//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{
        discover_documents, BatchDriver, BatchStatus, Extractor, ExtractorConfig, ProcessedRecord,
        ResponseMode, SourceDocument,
    };
    use mailsift_domain::traits::LlmProvider;
    use mailsift_domain::{CanonicalRecord, Importance, UNKNOWN_SENDER, UNKNOWN_SUBJECT};
    use mailsift_llm::MockProvider;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const WORKSHOP_EMAIL: &str = "# マイクロソフトワークショップ準備打ち合わせ\n\
        \n\
        **To:** hochi@example.co.jp\n\
        **From:** saionji@example.com\n\
        **Received:** 2025-11-19 09:12:50\n\
        \n\
        ---\n\
        \n\
        宝地様\n\
        \n\
        お世話になっております。西園寺です。\n\
        掲題の件、12/24のワークショップ準備としてMS社と打ち合わせすることになりました。\n";

    const WORKSHOP_FRAGMENTS: &str = r#"```json
{
  "extractions": [
    {
      "extraction_class": "header_info",
      "extraction_text": "",
      "attributes": {
        "subject": "マイクロソフトワークショップ準備打ち合わせ",
        "sender": "saionji@example.com",
        "recipients": "hochi@example.co.jp",
        "received_at": "2025-11-19 09:12:50"
      }
    },
    {
      "extraction_class": "analysis_result",
      "extraction_text": "",
      "attributes": {
        "importance": "通常",
        "keywords_detected": ["打ち合わせ"],
        "summary": "12/24のワークショップ準備のためMS社と打ち合わせを行う連絡。"
      }
    },
    {"extraction_class": "person", "extraction_text": "宝地様", "char_interval": {"start_pos": 124, "end_pos": 127}},
    {"extraction_class": "person", "extraction_text": "西園寺", "attributes": {"role": "sender"}},
    {"extraction_class": "company", "extraction_text": "MS社"},
    {"extraction_class": "project", "extraction_text": "マイクロソフトワークショップ"},
    {"extraction_class": "sentiment", "extraction_text": "neutral"}
  ]
}
```"#;

    fn extractor_with(provider: MockProvider, mode: ResponseMode) -> Extractor<MockProvider> {
        let config = ExtractorConfig {
            response_mode: mode,
            ..ExtractorConfig::default()
        };
        Extractor::new(provider, config).unwrap()
    }

    #[tokio::test]
    async fn test_full_extraction_flow() {
        let extractor = extractor_with(MockProvider::new(WORKSHOP_FRAGMENTS), ResponseMode::Fragments);

        let outcome = extractor.extract("workshop.md", WORKSHOP_EMAIL).await.unwrap();
        let record = outcome.record;

        assert_eq!(record.subject, "マイクロソフトワークショップ準備打ち合わせ");
        assert_eq!(record.sender, "saionji@example.com");
        assert!(record.recipients.contains("hochi@example.co.jp"));
        assert_eq!(record.received_at.unwrap().to_string(), "2025-11-19 09:12:50");
        assert_eq!(record.importance, Importance::Normal);
        assert!(record.mentioned_people.contains("宝地"));
        assert!(record.mentioned_people.contains("西園寺"));
        assert!(record.mentioned_companies.contains("MS社"));
        assert!(record.mentioned_projects.contains("マイクロソフトワークショップ"));
        assert!(record.action_required.is_none());
        assert_eq!(outcome.metadata.fragment_count, 7);
        assert_eq!(outcome.metadata.recognized_fragments, 6);
    }

    #[tokio::test]
    async fn test_record_mode_flow() {
        let provider = MockProvider::new(
            r#"{
                "subject": "【重要】契約書のご確認",
                "sender": "legal@example.com",
                "recipients": ["a@example.com", "b@example.com", "a@example.com"],
                "importance": "重大",
                "keywords_detected": ["契約", "重要"],
                "summary": "契約書の確認依頼",
                "action_required": "契約書に押印して返送する",
                "deadline": "10月末",
                "mentioned_people": ["田中様", "田中"]
            }"#,
        );
        let extractor = extractor_with(provider.clone(), ResponseMode::Record);

        let record = extractor.extract("contract.md", "契約書").await.unwrap().record;

        assert_eq!(record.importance, Importance::Critical);
        assert_eq!(record.recipients.len(), 2);
        assert_eq!(record.deadline.as_deref(), Some("10月末"));
        assert_eq!(record.mentioned_people.len(), 1);
        assert!(provider.last_schema().unwrap().contains("重大"));
    }

    #[tokio::test]
    async fn test_extraction_with_invalid_json() {
        let extractor = extractor_with(MockProvider::new("This is not JSON"), ResponseMode::Fragments);
        let err = extractor.extract("doc", "Some text").await.unwrap_err();
        assert_eq!(err.kind(), "GenerationError");
    }

    #[tokio::test]
    async fn test_extraction_with_empty_fragments() {
        let extractor = extractor_with(MockProvider::new(r#"{"extractions": []}"#), ResponseMode::Fragments);
        let err = extractor.extract("doc", "Some text").await.unwrap_err();
        assert_eq!(err.kind(), "EmptyExtractionError");
    }

    #[tokio::test]
    async fn test_extraction_with_bad_importance() {
        let extractor = extractor_with(
            MockProvider::new(r#"{"subject": "x", "importance": "very high"}"#),
            ResponseMode::Record,
        );
        let err = extractor.extract("doc", "text").await.unwrap_err();
        assert_eq!(err.kind(), "SchemaViolation");
    }

    #[tokio::test]
    async fn test_entities_only_fall_back_to_placeholders() {
        let extractor = extractor_with(
            MockProvider::new(r#"[{"extraction_class": "company", "extraction_text": "アクメ"}]"#),
            ResponseMode::Fragments,
        );
        let record = extractor.extract("doc", "アクメ").await.unwrap().record;
        assert_eq!(record.subject, UNKNOWN_SUBJECT);
        assert_eq!(record.sender, UNKNOWN_SENDER);
        assert!(record.mentioned_companies.contains("アクメ"));
    }

    #[tokio::test]
    async fn test_highlight_span_adjusted_for_honorific() {
        let extractor = extractor_with(
            MockProvider::new(r#"[{"extraction_class": "person", "extraction_text": "田中様", "char_interval": {"start_pos": 0, "end_pos": 3}}]"#),
            ResponseMode::Fragments,
        );
        let outcome = extractor.extract("doc", "田中様、お疲れ様です。").await.unwrap();
        assert_eq!(outcome.highlights.len(), 1);
        assert_eq!(outcome.highlights[0].span.end, 2);
    }

    #[tokio::test]
    async fn test_batch_resilience() {
        let mut provider = MockProvider::new(r#"[{"extraction_class": "keyword", "extraction_text": "請求"}]"#);
        provider.fail_when_contains("DOCUMENT-TWO");

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("01.md"), "DOCUMENT-ONE 請求書").unwrap();
        fs::write(dir.path().join("02.md"), "DOCUMENT-TWO 請求書").unwrap();
        fs::write(dir.path().join("03.md"), "DOCUMENT-THREE 請求書").unwrap();

        let documents = discover_documents(dir.path(), &[], false).unwrap();
        let extractor = Extractor::new(provider, ExtractorConfig::default()).unwrap();
        let report = BatchDriver::new(extractor).run(documents).await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.status(), BatchStatus::Partial);
        assert_eq!(report.failures[0].document_id, "02.md");
        assert_eq!(report.failures[0].kind, "GenerationError");

        let names: Vec<_> = report.records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["01.md", "03.md"]);

        let out = dir.path().join("extraction_results.json");
        report.write_json(&out).unwrap();
        let written: Vec<ProcessedRecord> =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].filename, "01.md");
    }

    #[tokio::test]
    async fn test_batch_unreadable_document_is_isolated() {
        let provider = MockProvider::new(r#"[{"extraction_class": "keyword", "extraction_text": "請求"}]"#);
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.md"), "請求書").unwrap();
        fs::write(dir.path().join("binary.md"), [0xc3, 0x28, 0xa0, 0xa1]).unwrap();

        let documents = discover_documents(dir.path(), &[], false).unwrap();
        let extractor = Extractor::new(provider, ExtractorConfig::default()).unwrap();
        let report = BatchDriver::new(extractor).run(documents).await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures[0].document_id, "binary.md");
        assert_eq!(report.failures[0].kind, "InputError");
    }

    #[tokio::test]
    async fn test_batch_all_failed_still_completes() {
        let extractor = Extractor::new(MockProvider::failing("quota"), ExtractorConfig::default()).unwrap();
        let docs = vec![SourceDocument::inline("a", "x"), SourceDocument::inline("b", "y")];

        let report = BatchDriver::new(extractor).run(docs).await;
        assert_eq!(report.status(), BatchStatus::AllFailed);
        assert_eq!(report.to_json().unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order_under_concurrency() {
        let provider = MockProvider::new(r#"[{"extraction_class": "keyword", "extraction_text": "定例"}]"#)
            .with_delay(Duration::from_millis(20));
        let extractor = Extractor::new(provider.clone(), ExtractorConfig::default()).unwrap();

        let docs: Vec<_> = (0..10)
            .map(|i| SourceDocument::inline(format!("doc-{:02}", i), "定例"))
            .collect();
        let report = BatchDriver::new(extractor).with_concurrency(3).run(docs).await;

        let names: Vec<_> = report.records.iter().map(|r| r.filename.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("doc-{:02}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(provider.call_count(), 10);
    }

    /// Backend that answers slowly and records how many calls overlap
    #[derive(Default)]
    struct SlowBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl LlmProvider for SlowBackend {
        type Error = String;

        fn generate(&self, prompt: &str) -> Result<String, String> {
            self.generate_structured(prompt, "")
        }

        fn generate_structured(&self, _prompt: &str, _schema: &str) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1500));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(r#"[{"extraction_class": "keyword", "extraction_text": "遅延"}]"#.to_string())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_timeouts_do_not_exceed_concurrency() {
        let backend = Arc::new(SlowBackend::default());
        let config = ExtractorConfig {
            generation_timeout_secs: 1,
            concurrency: 1,
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::with_shared_provider(Arc::clone(&backend), config).unwrap();
        let docs: Vec<_> = (0..3)
            .map(|i| SourceDocument::inline(format!("slow-{}", i), "遅延"))
            .collect();

        let report = BatchDriver::new(extractor).run(docs).await;

        assert_eq!(report.failed(), 3);
        assert!(report.failures.iter().all(|f| f.kind == "GenerationError"));
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1700)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_record_mode_empty_object_rejected() {
        let extractor = extractor_with(MockProvider::new("{}"), ResponseMode::Record);
        let err = extractor.extract("doc", "本文").await.unwrap_err();
        assert_eq!(err.kind(), "EmptyExtractionError");

        let blank = extractor_with(
            MockProvider::new(r#"{"subject": "  ", "recipients": [], "mood": "calm"}"#),
            ResponseMode::Record,
        );
        let err = blank.extract("doc", "本文").await.unwrap_err();
        assert_eq!(err.kind(), "EmptyExtractionError");
    }

    #[tokio::test]
    async fn test_fragments_without_content_rejected() {
        let extractor = extractor_with(
            MockProvider::new(
                r#"[{"extraction_class":"person","extraction_text":""},{"extraction_class":"header_info","attributes":{"foo":"bar"}}]"#,
            ),
            ResponseMode::Fragments,
        );
        let err = extractor.extract("doc", "本文").await.unwrap_err();
        assert_eq!(err.kind(), "EmptyExtractionError");
    }

    #[tokio::test]
    async fn test_batch_output_keeps_non_ascii() {
        let extractor = extractor_with(
            MockProvider::new(r#"{"subject": "週次定例", "importance": "低"}"#),
            ResponseMode::Record,
        );
        let report = BatchDriver::new(extractor)
            .run(vec![SourceDocument::inline("weekly.md", "週次定例")])
            .await;

        let json = report.to_json().unwrap();
        assert!(json.contains("\"subject\": \"週次定例\""));
        assert!(json.contains("\"importance\": \"低\""));
        assert!(json.contains("\"filename\": \"weekly.md\""));
    }

    #[test]
    fn test_importance_json_round_trip() {
        let record = CanonicalRecord {
            importance: Importance::Critical,
            ..CanonicalRecord::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: CanonicalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.importance, Importance::Critical);
        assert_eq!(back, record);
    }
}
