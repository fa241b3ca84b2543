use topic_scout::extract::{FALLBACK_MESSAGE, Strategy, extract_final_result};

const CREW_TRANSCRIPT: &str = "\
\x1b[1m\x1b[95m# Agent:\x1b[00m \x1b[1m\x1b[92mAI Research Creator with Tools\x1b[00m
╭──────────────────────────── 🚀 Crew Execution Started ────────────────────────────╮
│  Name: crew                                                                         │
╰─────────────────────────────────────────────────────────────────────────────────────╯
🚀 Crew: crew
└── 📋 Task: 7f2c
    Assigned to: AI Research Creator with Tools
    Status: ✅ Completed
## Final Answer:
Photosynthesis is the process by which plants convert light into chemical energy.
🔧 Chlorophyll in the thylakoid membranes absorbs red and blue light.
ok
The Calvin cycle then fixes carbon dioxide into glucose.
╭──────────────────────────── Task Completion ────────────────────────────╮
│  Task Completed                                                          │
╰──────────────────────────────────────────────────────────────────────────╯
";

#[test]
fn crew_style_transcript_uses_labeled_section() {
    let result = extract_final_result(CREW_TRANSCRIPT);
    assert_eq!(result.strategy, Strategy::LabeledSection);
    assert_eq!(
        result.display_text(),
        "Photosynthesis is the process by which plants convert light into chemical energy.\n\
         Chlorophyll in the thylakoid membranes absorbs red and blue light.\n\
         The Calvin cycle then fixes carbon dioxide into glucose."
    );
}

#[test]
fn marker_wins_over_labeled_section() {
    let transcript = format!(
        "{CREW_TRANSCRIPT}\n==================================================\n\
         \x1b[1mFINAL RESULT:\x1b[0m\n\
         \x1b[32mPlants turn sunlight, water and CO2 into sugar.\x1b[0m\n\
         ═══════\n\
         Oxygen is released as a by-product.\n"
    );
    let result = extract_final_result(&transcript);
    assert_eq!(result.strategy, Strategy::Marker);
    let shown = result.display_text();
    assert_eq!(
        shown,
        "Plants turn sunlight, water and CO2 into sugar.\nOxygen is released as a by-product."
    );
    assert!(!shown.contains('\x1b'));
}

#[test]
fn labeled_capture_stops_at_first_end_phrase() {
    let transcript = "\
Final Answer:
The tides are driven mainly by the Moon's gravity.
Spring tides happen when Sun and Moon align.
Tool used: search
Neap tides happen at quarter moons and are weaker.
";
    let result = extract_final_result(transcript);
    assert_eq!(result.strategy, Strategy::LabeledSection);
    assert_eq!(
        result.text,
        "The tides are driven mainly by the Moon's gravity.\nSpring tides happen when Sun and Moon align."
    );
    assert!(result.text.lines().all(|l| l.chars().count() > 10));
}

#[test]
fn plain_log_falls_back_to_last_long_block() {
    let transcript = "\
Starting research on: ocean tides
This first paragraph is long enough to count as a block.
It continues on a second long line of text here.

short
│ This long line is inside a box and counts as UI chrome │
The final paragraph summarizes everything that was found.
It is also written across two sufficiently long lines.
done
";
    let result = extract_final_result(transcript);
    assert_eq!(result.strategy, Strategy::LastBlock);
    assert_eq!(
        result.text,
        "The final paragraph summarizes everything that was found.\n\
         It is also written across two sufficiently long lines."
    );
}

#[test]
fn decorative_only_transcript_gives_fallback() {
    for transcript in ["", "\n\n", "╭──╮\n│  │\n╰──╯\n", "🚀\n📋 ok\n"] {
        let result = extract_final_result(transcript);
        assert_eq!(result.strategy, Strategy::Fallback);
        assert_eq!(result.display_text(), FALLBACK_MESSAGE);
    }
}

#[test]
fn ansi_only_result_displays_fallback() {
    let result = extract_final_result("FINAL RESULT:\n\x1b[0m\x1b[1;32m\n");
    assert_eq!(result.strategy, Strategy::Marker);
    assert_eq!(result.display_text(), FALLBACK_MESSAGE);
}
