//! Keyword tables behind the rule passes. Matching is substring-based on the
//! lowercased diary text, so Korean entries are stems ("기쁘" matches 기쁘다,
//! 기쁘고, ...).

pub const POSITIVE_SURPRISE: &[&str] = &[
    "기쁘", "좋은 소식", "반가운", "감동", "선물", "축하", "합격", "성공", "칭찬", "대박",
    "행복한", "잘됐다", "good news", "surprise party", "congrat", "gift", "passed",
];

pub const NEGATIVE_SURPRISE: &[&str] = &[
    "충격", "실망", "황당", "어이없", "문제 생겼", "사고", "망했다", "나쁜 소식", "당황", "멘붕",
    "큰일", "무서웠", "shock", "bad news", "accident", "disappoint", "ruined",
];

pub const SURPRISE_TRIGGERS: &[&str] = &[
    "놀라", "놀랐", "놀람", "갑자기", "깜짝", "surprise", "suddenly", "unexpected",
];

pub const POSITIVE_SHAME: &[&str] = &[
    "설레", "좋아하는 사람", "썸", "두근", "얼굴 빨개졌", "부끄러웠지만 좋았", "칭찬받아",
    "기분 좋게", "butterflies", "crush", "flattered",
];

pub const NEGATIVE_SHAME: &[&str] = &[
    "창피", "민망", "수치심", "망신", "무안", "머쓱", "욕먹었", "오해받", "실수해서", "잘못해서",
    "humiliat", "ashamed", "scolded",
];

pub const SHAME_TRIGGERS: &[&str] = &[
    "부끄러", "부끄럽", "창피", "민망", "당황", "embarrass", "awkward", "ashamed",
];

/// Generic positive affect, consulted for Surprise only when nothing else decided.
pub const POSITIVE_AFFECT: &[&str] = &[
    "기쁘", "행복", "좋았", "즐거", "신났", "happy", "glad", "delighted",
];

pub const SURPRISE_SPLIT: &[&str] = &[
    "놀라", "놀랐", "놀람", "충격", "황당", "어이없", "신기", "대박", "기쁜 소식", "좋은 소식",
    "반가운", "합격", "성공", "축하", "실망", "문제 생겼", "사고", "망했", "나쁜 소식", "멘붕",
    "큰일", "surprise", "shock", "unexpected",
];

pub const SHAME_SPLIT: &[&str] = &[
    "부끄러", "부끄럽", "창피", "민망", "수치심", "망신", "무안", "머쓱", "당황", "난처", "설레",
    "두근", "얼굴 빨개졌", "좋아하는 사람", "썸", "욕먹었", "오해받", "실수해서", "잘못해서",
    "embarrass", "awkward", "ashamed",
];

pub const LOVE: &[&str] = &[
    "사랑", "좋아", "애정", "그리움", "보고싶", "그리워", "소중", "고마워", "감사", "귀여워",
    "예뻐", "정들었", "애착", "love", "miss you", "grateful", "thankful", "adore",
];

pub const STRONG_POSITIVE: &[&str] = &[
    "행복", "기쁘", "즐거", "신났", "최고", "뿌듯", "설레", "happy", "joy", "wonderful", "amazing",
];

pub const NEGATIVE: &[&str] = &[
    "슬프", "우울", "화가", "짜증", "불안", "걱정", "무서", "눈물", "힘들", "속상", "sad", "angry",
    "worried", "afraid", "upset",
];

// Heuristic cues for the local fallback classifier.
pub const CUE_JOY: &[&str] = &["기쁘", "행복", "좋았", "즐거", "신났", "happy", "glad", "fun"];
pub const CUE_ANXIETY: &[&str] = &["불안", "걱정", "두렵", "초조", "anxious", "worried", "nervous"];
pub const CUE_ANGER: &[&str] = &["화가", "짜증", "열받", "빡치", "angry", "annoyed", "furious"];
pub const CUE_SADNESS: &[&str] = &["슬프", "우울", "눈물", "서럽", "sad", "depressed", "cried"];
pub const CUE_EMBARRASSMENT: &[&str] = &["당황", "난처", "머쓱", "embarrass", "awkward"];
pub const CUE_HURT: &[&str] = &["상처", "섭섭", "속상", "서운", "hurt", "let down"];
pub const CUE_FATIGUE: &[&str] = &[
    "피곤", "지치", "지침", "힘들", "고단", "피로", "tired", "exhausted",
];
