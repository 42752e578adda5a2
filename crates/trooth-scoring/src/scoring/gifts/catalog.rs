use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub const EXPECTED_ITEMS: usize = 72;
pub const EXPECTED_GIFTS: usize = 24;
pub const ITEMS_PER_GIFT: usize = 3;

/// `(code, gift slug, statement)` for every inventory item.
pub const QUESTION_ITEMS: [(&str, &str, &str); EXPECTED_ITEMS] = [
    ("Q01", "wisdom", "I offer practical, Christlike solutions from Scripture."),
    ("Q02", "hospitality", "I enjoy creating warm, welcoming spaces for people."),
    ("Q03", "evangelism", "I naturally guide conversations toward the gospel."),
    ("Q04", "leadership", "People look to me for direction when plans are unclear."),
    ("Q05", "faith", "My faith often inspires courage in others."),
    ("Q06", "helps", "I willingly do unnoticed tasks to meet needs."),
    ("Q07", "teaching", "People say I make complex ideas understandable."),
    ("Q08", "prophecy", "I boldly speak Biblical truth to bring clarity."),
    ("Q09", "craftsmanship", "I enjoy building/making things that serve ministry."),
    ("Q10", "pastor-shepherd", "I check in on people’s well‑being and follow up consistently."),
    ("Q11", "intercession", "I maintain prayer lists and pray with expectancy."),
    ("Q12", "mercy", "I feel deep compassion for those in pain."),
    ("Q13", "knowledge", "I connect Scriptures to explain complex situations."),
    ("Q14", "administration", "I track details so teams deliver reliably."),
    ("Q15", "music-worship", "I steward musical/creative skills for God’s glory."),
    ("Q16", "healing", "I’m drawn to minister to the sick and hurting."),
    ("Q17", "service", "I prefer doing what’s needed over being noticed."),
    ("Q18", "giving", "I enjoy resourcing ministry beyond the minimum."),
    ("Q19", "discernment", "I often perceive motives behind words or actions."),
    ("Q20", "missionary", "I adapt to new environments for the gospel."),
    ("Q21", "tongues-interpretation", "I pray in a spiritual language privately."),
    ("Q22", "exhortation", "I encourage others with timely, Scripture‑rooted words."),
    ("Q23", "leadership", "I align tasks and people to keep the big picture in focus."),
    ("Q24", "faith", "I confidently trust God for unseen outcomes."),
    ("Q25", "miracles", "I expect God to act beyond natural limitations."),
    ("Q26", "service", "I organize my time to consistently meet tangible needs."),
    ("Q27", "exhortation", "I help others take practical next steps of faith."),
    ("Q28", "craftsmanship", "I plan and execute hands‑on projects well."),
    ("Q29", "prophecy", "I sense timely messages God wants emphasized."),
    ("Q30", "pastor-shepherd", "I’m drawn to nurture those working through life issues."),
    ("Q31", "music-worship", "I lead or support musical worship effectively."),
    ("Q32", "helps", "I feel satisfied when practical work enables the mission."),
    ("Q33", "intercession", "I feel burdened to pray until breakthrough comes."),
    ("Q34", "evangelism", "I explain salvation clearly to non‑Christians."),
    ("Q35", "administration", "I design systems that make work efficient."),
    ("Q36", "giving", "I plan my finances to give generously to God’s work."),
    ("Q37", "discernment", "I can identify truth from error in confusing situations."),
    ("Q38", "wisdom", "I can apply Biblical principles fruitfully in grey areas."),
    ("Q39", "miracles", "I have prayed and seen outcomes shift in remarkable ways."),
    ("Q40", "teaching", "I enjoy studying and communicating Biblical truth."),
    ("Q41", "knowledge", "I often clarify confusion by bringing relevant truth."),
    ("Q42", "hospitality", "I notice newcomers and help them feel at home."),
    ("Q43", "mercy", "I advocate for the vulnerable and overlooked."),
    ("Q44", "leadership", "I naturally motivate groups to move toward a clear vision."),
    ("Q45", "missionary", "I build relationships that cross cultural boundaries."),
    ("Q46", "faith", "I choose obedience even when results aren’t visible."),
    ("Q47", "healing", "I pray for physical/mental healing with persistent faith."),
    ("Q48", "pastor-shepherd", "I notice and respond to spiritual and emotional needs."),
    ("Q49", "tongues-interpretation", "Praying in tongues is encouraging and important to me."),
    ("Q50", "service", "I’m quick to volunteer for practical tasks."),
    ("Q51", "miracles", "Others seek my faith when situations appear impossible."),
    ("Q52", "intercession", "I regularly “stand in the gap” for people in prayer."),
    ("Q53", "prophecy", "I feel compelled to confront error with Scripture."),
    ("Q54", "apostleship", "I thrive in breaking new ground for the church."),
    ("Q55", "exhortation", "People say my feedback lifts and directs them."),
    ("Q56", "knowledge", "I retain Biblical facts and contexts that help others."),
    ("Q57", "helps", "I enjoy supporting others so ministry succeeds."),
    ("Q58", "music-worship", "I help others engage God through music/arts."),
    ("Q59", "discernment", "I sense when something sounds off spiritually or doctrinally."),
    ("Q60", "administration", "I organize people and tasks to hit goals."),
    ("Q61", "apostleship", "I start or pioneer new ministries."),
    ("Q62", "hospitality", "I think about details that make gatherings comfortable."),
    ("Q63", "healing", "People report healing after I intercede for them."),
    ("Q64", "giving", "I notice strategic opportunities to fund Kingdom impact."),
    ("Q65", "evangelism", "I actively look for opportunities to share Jesus."),
    ("Q66", "teaching", "I structure content so others understand Scripture."),
    ("Q67", "apostleship", "I recruit and equip teams to launch new work."),
    ("Q68", "wisdom", "People seek my counsel for next steps."),
    ("Q69", "craftsmanship", "I contribute skilled work (sets, spaces, tools)."),
    ("Q70", "tongues-interpretation", "God uses me to interpret what someone speaking in tongues is saying."),
    ("Q71", "missionary", "I’m drawn to reach people of different cultures."),
    ("Q72", "mercy", "I sit with people in their suffering without rushing them."),
];

/// Gift slug to the three item codes summed for it.
pub const GIFT_MAP: [(&str, &[&str]); EXPECTED_GIFTS] = [
    ("leadership", &["Q04", "Q23", "Q44"]),
    ("pastor-shepherd", &["Q10", "Q30", "Q48"]),
    ("discernment", &["Q19", "Q37", "Q59"]),
    ("exhortation", &["Q22", "Q27", "Q55"]),
    ("hospitality", &["Q02", "Q42", "Q62"]),
    ("prophecy", &["Q08", "Q29", "Q53"]),
    ("knowledge", &["Q13", "Q41", "Q56"]),
    ("miracles", &["Q25", "Q39", "Q51"]),
    ("healing", &["Q16", "Q47", "Q63"]),
    ("helps", &["Q06", "Q32", "Q57"]),
    ("mercy", &["Q12", "Q43", "Q72"]),
    ("evangelism", &["Q03", "Q34", "Q65"]),
    ("faith", &["Q05", "Q24", "Q46"]),
    ("teaching", &["Q07", "Q40", "Q66"]),
    ("wisdom", &["Q01", "Q38", "Q68"]),
    ("intercession", &["Q11", "Q33", "Q52"]),
    ("service", &["Q17", "Q26", "Q50"]),
    ("tongues-interpretation", &["Q21", "Q49", "Q70"]),
    ("giving", &["Q18", "Q36", "Q64"]),
    ("missionary", &["Q20", "Q45", "Q71"]),
    ("apostleship", &["Q54", "Q61", "Q67"]),
    ("craftsmanship", &["Q09", "Q28", "Q69"]),
    ("administration", &["Q14", "Q35", "Q60"]),
    ("music-worship", &["Q15", "Q31", "Q58"]),
];

/// A single inventory statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiftItem {
    pub code: String,
    pub gift_slug: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gift {
    pub slug: String,
    pub display_name: String,
    pub codes: Vec<String>,
}

/// Immutable, validated partition of item codes into gifts.
#[derive(Debug, Clone)]
pub struct GiftCatalog {
    items: Vec<GiftItem>,
    gifts: Vec<Gift>,
    codes: BTreeSet<String>,
}

impl GiftCatalog {
    /// Builds the bundled 72-item inventory.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::build(&QUESTION_ITEMS, &GIFT_MAP)
    }

    /// Validates the item list against the gift map and freezes the result.
    ///
    /// Rejects wrong item or gift counts, duplicate codes, gifts without
    /// exactly three codes, codes claimed by two gifts, incomplete coverage
    /// and items whose slug disagrees with the map.
    pub fn build(
        items: &[(&str, &str, &str)],
        map: &[(&str, &[&str])],
    ) -> Result<Self, CatalogError> {
        if items.len() != EXPECTED_ITEMS {
            return Err(CatalogError::ItemCount {
                expected: EXPECTED_ITEMS,
                found: items.len(),
            });
        }

        let mut item_gift: BTreeMap<&str, &str> = BTreeMap::new();
        for &(code, slug, _) in items {
            if item_gift.insert(code, slug).is_some() {
                return Err(CatalogError::DuplicateItem(code.to_string()));
            }
        }

        if map.len() != EXPECTED_GIFTS {
            return Err(CatalogError::GiftCount {
                expected: EXPECTED_GIFTS,
                found: map.len(),
            });
        }

        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        for &(slug, codes) in map {
            if codes.len() != ITEMS_PER_GIFT {
                return Err(CatalogError::GiftSize {
                    gift: slug.to_string(),
                    found: codes.len(),
                });
            }
            for &code in codes {
                if owner.insert(code, slug).is_some() {
                    return Err(CatalogError::OverlappingCode(code.to_string()));
                }
            }
        }

        let unmapped: Vec<String> = item_gift
            .keys()
            .filter(|code| !owner.contains_key(*code))
            .map(|code| code.to_string())
            .collect();
        let unknown: Vec<String> = owner
            .keys()
            .filter(|code| !item_gift.contains_key(*code))
            .map(|code| code.to_string())
            .collect();
        if !unmapped.is_empty() || !unknown.is_empty() {
            return Err(CatalogError::Coverage { unmapped, unknown });
        }

        for (code, slug) in &item_gift {
            let mapped = owner.get(code).copied().unwrap_or_default();
            if mapped != *slug {
                return Err(CatalogError::MismatchedGift {
                    code: code.to_string(),
                    item_gift: slug.to_string(),
                    mapped_gift: mapped.to_string(),
                });
            }
        }

        let items = items
            .iter()
            .map(|(code, slug, text)| GiftItem {
                code: code.to_string(),
                gift_slug: slug.to_string(),
                text: text.to_string(),
            })
            .collect();
        let gifts = map
            .iter()
            .map(|(slug, codes)| Gift {
                slug: slug.to_string(),
                display_name: display_name(slug),
                codes: codes.iter().map(|code| code.to_string()).collect(),
            })
            .collect();
        let codes = item_gift.keys().map(|code| code.to_string()).collect();

        Ok(Self {
            items,
            gifts,
            codes,
        })
    }

    pub fn items(&self) -> &[GiftItem] {
        &self.items
    }

    pub fn gifts(&self) -> &[Gift] {
        &self.gifts
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Item codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn item(&self, code: &str) -> Option<&GiftItem> {
        self.items.iter().find(|item| item.code == code)
    }
}

/// Human-facing gift name derived from its slug.
pub fn display_name(slug: &str) -> String {
    match slug {
        "pastor-shepherd" => "Pastor/Shepherd".to_string(),
        "music-worship" => "Music/Worship".to_string(),
        "tongues-interpretation" => "Tongues & Interpretation".to_string(),
        other => other
            .split('-')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Structural defect found while assembling a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog must contain {expected} items, found {found}")]
    ItemCount { expected: usize, found: usize },
    #[error("catalog must contain {expected} gifts, found {found}")]
    GiftCount { expected: usize, found: usize },
    #[error("duplicate item code {0}")]
    DuplicateItem(String),
    #[error("gift {gift} maps {found} items, expected 3")]
    GiftSize { gift: String, found: usize },
    #[error("item {0} is mapped to more than one gift")]
    OverlappingCode(String),
    #[error("catalog coverage mismatch (unmapped: {unmapped:?}, unknown: {unknown:?})")]
    Coverage {
        unmapped: Vec<String>,
        unknown: Vec<String>,
    },
    #[error("item {code} declares gift {item_gift} but is mapped to {mapped_gift}")]
    MismatchedGift {
        code: String,
        item_gift: String,
        mapped_gift: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_complete() {
        let catalog = GiftCatalog::standard().expect("bundled catalog validates");
        assert_eq!(catalog.items().len(), EXPECTED_ITEMS);
        assert_eq!(catalog.gifts().len(), EXPECTED_GIFTS);
        assert!(catalog
            .gifts()
            .iter()
            .all(|gift| gift.codes.len() == ITEMS_PER_GIFT));
        assert_eq!(catalog.codes().next(), Some("Q01"));
        assert_eq!(catalog.codes().last(), Some("Q72"));
        assert_eq!(
            catalog.item("Q05").map(|item| item.gift_slug.as_str()),
            Some("faith")
        );
    }

    #[test]
    fn display_names_apply_overrides() {
        assert_eq!(display_name("pastor-shepherd"), "Pastor/Shepherd");
        assert_eq!(display_name("music-worship"), "Music/Worship");
        assert_eq!(
            display_name("tongues-interpretation"),
            "Tongues & Interpretation"
        );
        assert_eq!(display_name("faith"), "Faith");
        assert_eq!(display_name("gift-of-helps"), "Gift Of Helps");
    }

    #[test]
    fn rejects_short_item_list() {
        let err = GiftCatalog::build(&QUESTION_ITEMS[..71], &GIFT_MAP).unwrap_err();
        assert_eq!(
            err,
            CatalogError::ItemCount {
                expected: 72,
                found: 71
            }
        );
    }

    #[test]
    fn rejects_duplicate_item_codes() {
        let mut items = QUESTION_ITEMS.to_vec();
        items[1].0 = "Q01";
        let err = GiftCatalog::build(&items, &GIFT_MAP).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateItem("Q01".to_string()));
    }

    #[test]
    fn rejects_gift_with_wrong_arity() {
        let mut map = GIFT_MAP.to_vec();
        map[0].1 = &["Q04", "Q23"][..];
        let err = GiftCatalog::build(&QUESTION_ITEMS, &map).unwrap_err();
        assert!(matches!(err, CatalogError::GiftSize { found: 2, .. }));
    }

    #[test]
    fn rejects_overlapping_codes() {
        let mut map = GIFT_MAP.to_vec();
        map[1].1 = &["Q04", "Q30", "Q48"][..];
        let err = GiftCatalog::build(&QUESTION_ITEMS, &map).unwrap_err();
        assert_eq!(err, CatalogError::OverlappingCode("Q04".to_string()));
    }

    #[test]
    fn rejects_incomplete_coverage() {
        let mut map = GIFT_MAP.to_vec();
        map[0].1 = &["Q04", "Q23", "Q99"][..];
        let err = GiftCatalog::build(&QUESTION_ITEMS, &map).unwrap_err();
        match err {
            CatalogError::Coverage { unmapped, unknown } => {
                assert_eq!(unmapped, vec!["Q44".to_string()]);
                assert_eq!(unknown, vec!["Q99".to_string()]);
            }
            other => panic!("expected coverage error, got {other:?}"),
        }
    }
}
