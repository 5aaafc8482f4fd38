//! Few-shot exemplars shown to the backend before the target document

use mailsift_domain::{AttributeValue, ExtractionFragment, SourceSpan};

/// A sample email paired with the fragments it should produce
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    /// Sample document text
    pub text: String,

    /// Expected fragments, in the order shown to the backend
    pub fragments: Vec<ExtractionFragment>,
}

impl Exemplar {
    /// Start an exemplar with no fragments
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fragments: Vec::new(),
        }
    }

    /// Add a fragment for a verbatim substring, locating its span in the text
    pub fn mention(mut self, class_label: &str, matched_text: &str) -> Self {
        let mut fragment = ExtractionFragment::new(class_label, matched_text);
        fragment.source_span = locate(&self.text, matched_text);
        self.fragments.push(fragment);
        self
    }

    /// Add an attribute-bearing fragment with no matched text
    pub fn attributes<I, K, V>(mut self, class_label: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let fragment = attributes
            .into_iter()
            .fold(ExtractionFragment::new(class_label, ""), |f, (k, v)| {
                f.with_attribute(k, v)
            });
        self.fragments.push(fragment);
        self
    }
}

/// Character span of the first occurrence of `needle` in `text`
pub fn locate(text: &str, needle: &str) -> Option<SourceSpan> {
    if needle.is_empty() {
        return None;
    }
    let byte_start = text.find(needle)?;
    let start = text[..byte_start].chars().count();
    Some(SourceSpan::new(start, start + needle.chars().count()))
}

/// Ordered collection of exemplars
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExemplarSet {
    exemplars: Vec<Exemplar>,
}

impl ExemplarSet {
    /// Wrap a list of exemplars
    pub fn new(exemplars: Vec<Exemplar>) -> Self {
        Self { exemplars }
    }

    /// Iterate exemplars in presentation order
    pub fn iter(&self) -> impl Iterator<Item = &Exemplar> {
        self.exemplars.iter()
    }

    /// Number of exemplars
    pub fn len(&self) -> usize {
        self.exemplars.len()
    }

    /// True when no exemplars are present
    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    /// The built-in Japanese business-email exemplars, one per importance level
    pub fn builtin() -> Self {
        Self::new(vec![contract_renewal(), minutes_shared(), meeting_request()])
    }
}

fn contract_renewal() -> Exemplar {
    Exemplar::new(
        "# 【至急】保守契約更新のご確認\n\
         \n\
         **To:** sato@example.co.jp\n\
         **From:** kimura@acme-systems.example.jp\n\
         **Received:** 2025-10-02 14:05:00\n\
         \n\
         ---\n\
         \n\
         佐藤様\n\
         \n\
         いつもお世話になっております。アクメシステムズの木村です。\n\
         \n\
         来年度の保守契約の更新につきまして、契約書の最終版をお送りいたします。\n\
         WisE連携の追加費用も含まれておりますので、内容をご確認のうえ、10月10日までにご返信をお願いいたします。\n",
    )
    .attributes(
        "header_info",
        [
            ("subject", AttributeValue::from("【至急】保守契約更新のご確認")),
            ("sender", AttributeValue::from("kimura@acme-systems.example.jp")),
            ("recipients", AttributeValue::from(vec!["sato@example.co.jp"])),
            ("received_at", AttributeValue::from("2025-10-02 14:05:00")),
        ],
    )
    .attributes(
        "analysis_result",
        [
            ("importance", AttributeValue::from("重大")),
            ("keywords_detected", AttributeValue::from(vec!["至急", "契約"])),
            (
                "summary",
                AttributeValue::from("来年度の保守契約更新に向けて契約書の最終版が送付され、10月10日までの確認と返信を求められている。"),
            ),
            (
                "action_required",
                AttributeValue::from("契約書最終版とWisE連携の追加費用を確認して返信する"),
            ),
        ],
    )
    .mention("person", "佐藤様")
    .mention("person", "木村")
    .mention("company", "アクメシステムズ")
    .mention("project", "WisE連携")
    .mention("keyword", "至急")
    .mention("keyword", "契約")
    .mention("deadline", "10月10日まで")
    .mention("action_item", "内容をご確認のうえ、10月10日までにご返信をお願いいたします")
}

fn minutes_shared() -> Exemplar {
    Exemplar::new(
        "# 週次定例会議 議事録の共有\n\
         \n\
         **To:** team-all@example.co.jp\n\
         **Cc:** yamada@hokuto-bussan.example.jp\n\
         **From:** suzuki@example.co.jp\n\
         **Received:** 2025-11-05 09:30:00\n\
         \n\
         ---\n\
         \n\
         関係者各位\n\
         \n\
         本日の週次定例会議の議事録を共有いたします。\n\
         ご参考までにお送りするもので、特に対応は不要です。\n\
         北斗物産の山田さんにもCCで共有しております。\n",
    )
    .attributes(
        "header_info",
        [
            ("subject", AttributeValue::from("週次定例会議 議事録の共有")),
            ("sender", AttributeValue::from("suzuki@example.co.jp")),
            (
                "recipients",
                AttributeValue::from(vec!["team-all@example.co.jp", "yamada@hokuto-bussan.example.jp"]),
            ),
            ("received_at", AttributeValue::from("2025-11-05 09:30:00")),
        ],
    )
    .attributes(
        "analysis_result",
        [
            ("importance", AttributeValue::from("低")),
            ("keywords_detected", AttributeValue::List(Vec::new())),
            ("summary", AttributeValue::from("週次定例会議の議事録の共有。参考送付のため対応は不要。")),
        ],
    )
    .mention("person", "山田さん")
    .mention("company", "北斗物産")
}

fn meeting_request() -> Exemplar {
    Exemplar::new(
        "# ワークショップ準備打ち合わせの日程調整\n\
         \n\
         **To:** takahashi@example.co.jp\n\
         **From:** nishimura@partner.example.com\n\
         **Received:** 2025-11-19 09:12:50\n\
         \n\
         ---\n\
         \n\
         高橋様\n\
         \n\
         お世話になっております。西村です。\n\
         12/24のワークショップ準備として、来週中に打ち合わせのお時間をいただけますでしょうか。\n\
         候補日時をいくつかご提示いただけますと幸いです。\n",
    )
    .attributes(
        "header_info",
        [
            ("subject", AttributeValue::from("ワークショップ準備打ち合わせの日程調整")),
            ("sender", AttributeValue::from("nishimura@partner.example.com")),
            ("recipients", AttributeValue::from(vec!["takahashi@example.co.jp"])),
            ("received_at", AttributeValue::from("2025-11-19 09:12:50")),
        ],
    )
    .attributes(
        "analysis_result",
        [
            ("importance", AttributeValue::from("通常")),
            ("keywords_detected", AttributeValue::from(vec!["打ち合わせ"])),
            ("summary", AttributeValue::from("12/24のワークショップ準備に向けた打ち合わせの日程調整依頼。")),
            ("action_required", AttributeValue::from("打ち合わせの候補日時を提示する")),
        ],
    )
    .mention("person", "高橋様")
    .mention("person", "西村")
    .mention("keyword", "打ち合わせ")
    .mention("deadline", "来週中")
    .mention("action_item", "候補日時をいくつかご提示いただけますと幸いです")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(text: &str, span: SourceSpan) -> String {
        text.chars().skip(span.start).take(span.len()).collect()
    }

    #[test]
    fn test_locate_counts_characters() {
        let span = locate("佐藤様、こんにちは", "こんにちは").unwrap();
        assert_eq!(span, SourceSpan::new(4, 9));
        assert!(locate("abc", "z").is_none());
        assert!(locate("abc", "").is_none());
    }

    #[test]
    fn test_builtin_mentions_are_verbatim() {
        for exemplar in ExemplarSet::builtin().iter() {
            for fragment in exemplar.fragments.iter().filter(|f| !f.matched_text.is_empty()) {
                let span = fragment
                    .source_span
                    .unwrap_or_else(|| panic!("'{}' not found in exemplar", fragment.matched_text));
                assert_eq!(slice(&exemplar.text, span), fragment.matched_text);
            }
        }
    }

    #[test]
    fn test_builtin_covers_every_importance_level() {
        let levels: Vec<String> = ExemplarSet::builtin()
            .iter()
            .flat_map(|e| e.fragments.iter())
            .filter_map(|f| f.attributes.get("importance"))
            .map(|v| v.to_text())
            .collect();
        assert_eq!(levels, vec!["重大", "低", "通常"]);
    }

    #[test]
    fn test_attribute_fragments_have_no_text() {
        let set = ExemplarSet::builtin();
        let first = set.iter().next().unwrap();
        let header = &first.fragments[0];
        assert_eq!(header.class_label, "header_info");
        assert!(header.matched_text.is_empty());
        assert!(header.source_span.is_none());
        assert_eq!(header.attributes.len(), 4);
    }
}
