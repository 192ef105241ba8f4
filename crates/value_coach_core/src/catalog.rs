//! crates/value_coach_core/src/catalog.rs
//!
//! The static, ordered definition of the VALUE stages and their questions.
//!
//! A `Catalog` is built once at startup and shared by reference. It never
//! changes afterwards; prompt overrides are applied while building it.

use crate::domain::Stage;
use crate::error::{FlowError, FlowResult};

/// One question of a stage.
#[derive(Debug, Clone)]
pub struct Question {
    pub text: String,
    /// Drives the generation call for answers to this question.
    pub prompt_template: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_template: Some(prompt_template.into()),
        }
    }

    /// A question with no registered prompt template.
    pub fn without_prompt(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_template: None,
        }
    }
}

/// Everything the flow needs to present and run one stage.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub stage: Stage,
    pub title: String,
    pub intro: String,
    pub questions: Vec<Question>,
}

/// Messages shown around the staged flow rather than inside one stage.
#[derive(Debug, Clone)]
pub struct FlowMessages {
    pub framework_intro: String,
    pub stage_completed: String,
    pub closing: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("expected stage {expected} at position {position}, found {found:?}")]
    StageOrder {
        position: usize,
        expected: Stage,
        found: Option<Stage>,
    },
    #[error("the catalog defines more than the five stages")]
    TooManyStages,
    #[error("stage {0} has no questions")]
    EmptyStage(Stage),
}

#[derive(Debug, Clone)]
pub struct Catalog {
    // Indexed by `Stage::position`.
    stages: Vec<StageDefinition>,
    messages: FlowMessages,
}

impl Catalog {
    /// Builds a catalog, checking that it defines exactly the five stages in
    /// flow order and that none of them is empty.
    pub fn new(stages: Vec<StageDefinition>, messages: FlowMessages) -> Result<Self, CatalogError> {
        if stages.len() > Stage::ALL.len() {
            return Err(CatalogError::TooManyStages);
        }
        for (position, expected) in Stage::ALL.iter().enumerate() {
            let found = stages.get(position).map(|d| d.stage);
            if found != Some(*expected) {
                return Err(CatalogError::StageOrder {
                    position,
                    expected: *expected,
                    found,
                });
            }
            if stages[position].questions.is_empty() {
                return Err(CatalogError::EmptyStage(*expected));
            }
        }
        Ok(Self { stages, messages })
    }

    pub fn definition(&self, stage: Stage) -> &StageDefinition {
        &self.stages[stage.position()]
    }

    pub fn question_count(&self, stage: Stage) -> u32 {
        self.definition(stage).questions.len() as u32
    }

    /// The question at a 1-based `index`.
    pub fn question_at(&self, stage: Stage, index: u32) -> FlowResult<&Question> {
        let questions = &self.definition(stage).questions;
        index
            .checked_sub(1)
            .and_then(|i| questions.get(i as usize))
            .ok_or(FlowError::OutOfRange {
                stage,
                index,
                count: questions.len() as u32,
            })
    }

    pub fn stage_order(&self) -> &'static [Stage] {
        &Stage::ALL
    }

    /// The stage following `stage`, or `None` when `stage` is terminal.
    pub fn next_stage(&self, stage: Stage) -> Option<Stage> {
        Stage::ALL.get(stage.position() + 1).copied()
    }

    pub fn is_terminal(&self, stage: Stage) -> bool {
        self.next_stage(stage).is_none()
    }

    pub fn messages(&self) -> &FlowMessages {
        &self.messages
    }

    /// Replaces the prompt template of one question.
    pub fn with_prompt_template(
        mut self,
        stage: Stage,
        index: u32,
        template: impl Into<String>,
    ) -> FlowResult<Self> {
        self.question_at(stage, index)?;
        self.stages[stage.position()].questions[(index - 1) as usize].prompt_template =
            Some(template.into());
        Ok(self)
    }

    /// The reference VALUE framework flow (5, 4, 1, 1 and 1 questions).
    pub fn value_framework() -> Self {
        let stages = vec![
            StageDefinition {
                stage: Stage::Vision,
                title: "SESSION 1: VISION MAPPING".to_string(),
                intro: "Let's start with your vision. Answer the subsequent questions I'm going to ask you. Do not bother about giving the perfect response. Just be as honest as you can possibly be.".to_string(),
                questions: vec![
                    Question::new(
                        "What kind of lifestyle do you dream of in 5–10 years? (Describe the lifestyle you see yourself living)",
                        "You are a warm, insightful career and life coach. The user is describing the lifestyle they dream of living in 5 to 10 years. Reflect back the core values you hear in their answer, affirm what is inspiring about it, and gently point out one theme worth exploring further. Keep it to one or two short paragraphs.",
                    ),
                    Question::new(
                        "What kind of work would make you feel deeply fulfilled?",
                        "You are a warm, insightful career coach. The user is describing work that would make them feel deeply fulfilled. Connect their answer to what they shared earlier, name the motivations behind it, and suggest one or two kinds of roles or fields that resonate with it. Keep it concise.",
                    ),
                    Question::new(
                        "Who do you want to help or serve with your life?",
                        "You are a warm, insightful career coach. The user is describing who they want to help or serve. Highlight the sense of purpose in their answer and how it links to the lifestyle and work they described. Keep it encouraging and brief.",
                    ),
                    Question::new(
                        "Share a moment you felt most alive, inspired...or maybe you just felt like your true self.",
                        "You are a warm, insightful coach with a background in behavioural psychology. The user is sharing a moment they felt most alive or most like themselves. Identify the strengths and conditions present in that moment and explain what they reveal about the user. Keep it personal and brief.",
                    ),
                    Question::new(
                        "Is there something that probably came to your mind as we progressed through this session that you would love to share?",
                        "You are a warm, insightful coach closing the vision mapping session. Acknowledge whatever the user chose to share, then summarise their vision in three or four sentences drawing on all their previous answers.",
                    ),
                ],
            },
            StageDefinition {
                stage: Stage::Auditing,
                title: "SESSION 2: AUDITING (Skills)".to_string(),
                intro: "Now let's audit your current knowledge and skills. Are you ready?".to_string(),
                questions: vec![
                    Question::new(
                        "What are you currently studying or have studied in school?",
                        "You are an insightful career coach auditing the user's knowledge. The user is describing what they study or have studied. Point out the transferable knowledge in it and how it relates to the vision they described earlier. Keep it brief.",
                    ),
                    Question::new(
                        "What technical (hard) skills have you gained?",
                        "You are an insightful career coach auditing the user's skills. The user is listing their technical skills. Group them into themes, note which are most marketable, and relate them to the user's goals. Keep it brief.",
                    ),
                    Question::new(
                        "What things do you naturally do well?",
                        "You are an insightful coach with a background in behavioural psychology. The user is describing what they naturally do well. Name the underlying talents and explain how they could become a professional advantage. Keep it brief.",
                    ),
                    Question::new(
                        "Share a story or moment where you felt useful or impactful.",
                        "You are an insightful career coach closing the skills audit. Reflect on the user's story of being useful or impactful, then summarise their knowledge, skills and natural abilities in a few sentences.",
                    ),
                ],
            },
            StageDefinition {
                stage: Stage::Leverage,
                title: "SESSION 3: LEVERAGE".to_string(),
                intro: "Now, we've moved to the third session. This is to identify what gives you a natural edge. Please answer the 3 questions below at once:".to_string(),
                questions: vec![Question::new(
                    "What kind of environment do you thrive in? (e.g., quiet, fast-paced)\nWhat personality traits describe you best?\nWho inspires you and why?",
                    "You are an insightful career coach. The user has described the environment they thrive in, their personality traits and who inspires them. Combine these with everything they shared before to describe their natural edge and two or three career directions that leverage it.",
                )],
            },
            StageDefinition {
                stage: Stage::Upskill,
                title: "SESSION 4: UPSKILL STRATEGICALLY".to_string(),
                intro: "Let's help you upskill smartly, with high ROI. Answer:".to_string(),
                questions: vec![Question::new(
                    "What areas would you love to grow in?\nDo you have access to a laptop or smartphone with the internet?\nHow many hours a week can you invest in learning something new?",
                    "You are a practical learning coach. The user has described the areas they want to grow in, their access to devices and the internet, and the hours they can invest each week. Recommend a realistic, high return upskilling plan with specific free or low-cost resources suited to their situation and location.",
                )],
            },
            StageDefinition {
                stage: Stage::Execute,
                title: "SESSION 5: EXECUTE".to_string(),
                intro: "Finally, let's build your roadmap. Answer:".to_string(),
                questions: vec![Question::new(
                    "What's stopping you right now from acting on your goals?\nWhat's one thing you'd do if fear didn't exist?",
                    "You are a compassionate execution coach. The user has described what is stopping them and what they would do without fear. Address their obstacles with empathy, then lay out a personalised roadmap of concrete next steps for the next 30, 60 and 90 days based on everything they have shared.",
                )],
            },
        ];

        let messages = FlowMessages {
            framework_intro: "Now, I'll go through five deep, coaching-style sessions using the VALUE framework:\n\nV – Vision Mapping\nA – Auditing (your skills and knowledge)\nL – Leverage (your natural edge)\nU – Upskill strategically\nE – Execute (your personalized roadmap)\n\nBy the end, you'll receive career direction suggestions, upskilling ideas, and execution tips designed specifically for you. Let's begin with Session 1: Vision Mapping. Are you ready?".to_string(),
            stage_completed: "Great! Now let's move to the next session.".to_string(),
            closing: "You've completed the full VALUE self-consultation process. Take action on what you've learned, and reach out for a human mentor if you'd like personalized support and accountability. You are gifted. You are needed. The world is waiting.".to_string(),
        };

        match Catalog::new(stages, messages) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("reference catalog is well formed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> FlowMessages {
        FlowMessages {
            framework_intro: "intro".to_string(),
            stage_completed: "next".to_string(),
            closing: "bye".to_string(),
        }
    }

    fn one_question_stages() -> Vec<StageDefinition> {
        Stage::ALL
            .iter()
            .map(|stage| StageDefinition {
                stage: *stage,
                title: stage.as_str().to_uppercase(),
                intro: String::new(),
                questions: vec![Question::without_prompt("q1")],
            })
            .collect()
    }

    #[test]
    fn reference_flow_has_the_expected_question_counts() {
        let catalog = Catalog::value_framework();
        let counts: Vec<u32> = Stage::ALL
            .iter()
            .map(|s| catalog.question_count(*s))
            .collect();
        assert_eq!(counts, vec![5, 4, 1, 1, 1]);
    }

    #[test]
    fn every_reference_question_has_a_prompt_template() {
        let catalog = Catalog::value_framework();
        for stage in Stage::ALL {
            for index in 1..=catalog.question_count(stage) {
                let question = catalog.question_at(stage, index).unwrap();
                assert!(question.prompt_template.is_some(), "{stage} #{index}");
            }
        }
    }

    #[test]
    fn question_at_is_one_based_and_bounded() {
        let catalog = Catalog::value_framework();
        assert!(catalog
            .question_at(Stage::Vision, 1)
            .unwrap()
            .text
            .starts_with("What kind of lifestyle"));
        assert!(matches!(
            catalog.question_at(Stage::Vision, 0),
            Err(FlowError::OutOfRange { index: 0, .. })
        ));
        assert!(matches!(
            catalog.question_at(Stage::Auditing, 5),
            Err(FlowError::OutOfRange { count: 4, .. })
        ));
    }

    #[test]
    fn next_stage_walks_the_fixed_order() {
        let catalog = Catalog::value_framework();
        assert_eq!(catalog.next_stage(Stage::Vision), Some(Stage::Auditing));
        assert_eq!(catalog.next_stage(Stage::Auditing), Some(Stage::Leverage));
        assert_eq!(catalog.next_stage(Stage::Leverage), Some(Stage::Upskill));
        assert_eq!(catalog.next_stage(Stage::Upskill), Some(Stage::Execute));
        assert_eq!(catalog.next_stage(Stage::Execute), None);
        assert!(catalog.is_terminal(Stage::Execute));
        assert_eq!(catalog.stage_order(), &Stage::ALL);
    }

    #[test]
    fn new_rejects_out_of_order_or_missing_stages() {
        let mut stages = one_question_stages();
        stages.swap(0, 1);
        assert_eq!(
            Catalog::new(stages, messages()).unwrap_err(),
            CatalogError::StageOrder {
                position: 0,
                expected: Stage::Vision,
                found: Some(Stage::Auditing),
            }
        );

        let mut stages = one_question_stages();
        stages.pop();
        assert!(matches!(
            Catalog::new(stages, messages()),
            Err(CatalogError::StageOrder { found: None, .. })
        ));
    }

    #[test]
    fn new_rejects_empty_stages() {
        let mut stages = one_question_stages();
        stages[2].questions.clear();
        assert_eq!(
            Catalog::new(stages, messages()).unwrap_err(),
            CatalogError::EmptyStage(Stage::Leverage)
        );
    }

    #[test]
    fn prompt_templates_can_be_overridden_per_question() {
        let catalog = Catalog::new(one_question_stages(), messages()).unwrap();
        assert!(catalog
            .question_at(Stage::Upskill, 1)
            .unwrap()
            .prompt_template
            .is_none());

        let catalog = catalog
            .with_prompt_template(Stage::Upskill, 1, "coach me")
            .unwrap();
        assert_eq!(
            catalog
                .question_at(Stage::Upskill, 1)
                .unwrap()
                .prompt_template
                .as_deref(),
            Some("coach me")
        );
        assert!(catalog
            .with_prompt_template(Stage::Upskill, 2, "nope")
            .is_err());
    }
}
