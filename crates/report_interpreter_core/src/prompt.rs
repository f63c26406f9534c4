//! crates/report_interpreter_core/src/prompt.rs
//!
//! Builds the single instruction string sent to the language model from the
//! extracted report text and the user's profile.
//!
//! The personalization is a declarative rule table: each rule pairs a
//! predicate over the profile with the fragment it contributes. Rules are
//! evaluated in table order, so the output never depends on the order in
//! which the user picked their answers.

use crate::domain::{AgeBracket, Comorbidity, DetailLevel, EducationLevel, Profile};

/// A single personalization rule.
pub struct PromptRule {
    pub applies: fn(&Profile) -> bool,
    pub fragment: &'static str,
}

/// True if the goal's label mentions any of the given keywords.
fn goal_mentions(profile: &Profile, keywords: &[&str]) -> bool {
    profile
        .goal
        .map(|goal| {
            let label = goal.label().to_lowercase();
            keywords.iter().any(|k| label.contains(k))
        })
        .unwrap_or(false)
}

/// The ordered personalization rules.
///
/// Goal rules are keyword based and mutually exclusive for the fixed goal
/// list; the comorbidity rules walk a fixed checklist.
pub const PROMPT_RULES: &[PromptRule] = &[
    // --- Detail level ---
    PromptRule {
        applies: |p| p.detail == Some(DetailLevel::Simple),
        fragment: "Usa lenguaje muy sencillo y cotidiano. Evita términos técnicos.",
    },
    PromptRule {
        applies: |p| p.detail == Some(DetailLevel::Intermediate),
        fragment: "Usa lenguaje accesible pero incluye definiciones breves de conceptos médicos.",
    },
    PromptRule {
        applies: |p| p.detail == Some(DetailLevel::Technical),
        fragment: "Usa vocabulario clínico y referencia a guías médicas si es relevante.",
    },
    // --- Age ---
    PromptRule {
        applies: |p| p.age == Some(AgeBracket::Over65),
        fragment: "Ten en cuenta que es una persona mayor. Prioriza explicaciones claras y riesgos comunes.",
    },
    PromptRule {
        applies: |p| p.age == Some(AgeBracket::Under18),
        fragment: "Ten en cuenta que es una persona joven. Prioriza lenguaje más callejero y de jóvenes, pero sin entrar en lo vulgar.",
    },
    // --- Education ---
    PromptRule {
        applies: |p| p.education == Some(EducationLevel::HealthcareBackground),
        fragment: "La persona tiene conocimientos sanitarios, puedes profundizar en los aspectos técnicos.",
    },
    // --- Goal ---
    PromptRule {
        applies: |p| goal_mentions(p, &["legal"]),
        fragment: "La explicación debe ser formal, objetiva y adecuada para un contexto legal.",
    },
    PromptRule {
        applies: |p| goal_mentions(p, &["visita"]),
        fragment: "Sugiere posibles preguntas que puede hacerle a su médico en la consulta.",
    },
    PromptRule {
        applies: |p| goal_mentions(p, &["trabajo", "seguro"]),
        fragment: "Enfoca la explicación en aspectos laborales y en cómo podría justificar su situación médica.",
    },
    PromptRule {
        applies: |p| goal_mentions(p, &["entender"]),
        fragment: "Incluye recomendaciones generales de estilo de vida saludables relacionadas con los hallazgos.",
    },
    // --- Comorbidity checklist ---
    PromptRule {
        applies: |p| p.has(Comorbidity::Diabetes),
        fragment: "Haz énfasis en resultados relacionados con glucosa, función renal y dieta.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::Hypertension),
        fragment: "Destaca cualquier parámetro relacionado con presión arterial o riesgo cardiovascular.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::HighCholesterol),
        fragment: "Explica claramente los niveles de lípidos y su impacto en la salud.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::HeartDisease),
        fragment: "Prioriza aspectos cardiovasculares y signos de riesgo o empeoramiento.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::Obesity),
        fragment: "Relaciona los hallazgos con riesgos asociados al sobrepeso como hipertensión, diabetes o apnea del sueño.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::Smoking),
        fragment: "Destaca riesgos cardiovasculares, respiratorios y cualquier marcador alterado relacionado con el tabaquismo.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::Asthma),
        fragment: "Relaciona los hallazgos con síntomas respiratorios y controla signos de inflamación o alergia.",
    },
    PromptRule {
        applies: |p| p.has(Comorbidity::KidneyFailure),
        fragment: "Haz énfasis en creatinina, filtrado glomerular y parámetros que indiquen función renal.",
    },
];

/// Returns the fragments whose rule applies to `profile`, in table order.
pub fn instruction_fragments(profile: &Profile) -> Vec<&'static str> {
    PROMPT_RULES
        .iter()
        .filter(|rule| (rule.applies)(profile))
        .map(|rule| rule.fragment)
        .collect()
}

/// Builds the full prompt: persona preamble, selected instructions, then the
/// verbatim report text.
///
/// Pure and deterministic: the same `(report_text, profile)` always yields the
/// same string.
pub fn build_prompt(report_text: &str, profile: &Profile) -> String {
    let age = profile.age.map(|a| a.label()).unwrap_or_default();
    let education = profile
        .education
        .map(|e| e.label().to_lowercase())
        .unwrap_or_default();
    let goal = profile
        .goal
        .map(|g| g.label().to_lowercase())
        .unwrap_or_default();
    let conditions = if profile.comorbidities.is_empty() {
        "ninguna".to_string()
    } else {
        profile
            .comorbidities
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let instructions = instruction_fragments(profile).join(" ");

    format!(
        "Eres un asistente médico experto. El paciente tiene {age} años, con estudios {education}. \
         Tiene como objetivo: {goal}. \
         Condiciones médicas relevantes: {conditions}. \
         Instrucciones: {instructions}\n\n\
         Texto del informe médico:\n{report_text}"
    )
}

/// Cuts `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_report(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Goal;

    fn sample_profile() -> Profile {
        Profile {
            age: Some(AgeBracket::Over65),
            education: Some(EducationLevel::Basic),
            detail: Some(DetailLevel::Simple),
            goal: Some(Goal::PrepareVisit),
            comorbidities: [Comorbidity::Diabetes].into_iter().collect(),
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let profile = sample_profile();
        let first = build_prompt("Glucosa 180 mg/dL", &profile);
        for _ in 0..10 {
            assert_eq!(build_prompt("Glucosa 180 mg/dL", &profile), first);
        }
    }

    #[test]
    fn prompt_layout_matches_persona_and_report() {
        let prompt = build_prompt("Hemoglobina 13.5", &sample_profile());
        assert_eq!(
            prompt,
            "Eres un asistente médico experto. El paciente tiene ≥65 años, con estudios básicos. \
             Tiene como objetivo: preparar visita médica. \
             Condiciones médicas relevantes: Diabetes. \
             Instrucciones: Usa lenguaje muy sencillo y cotidiano. Evita términos técnicos. \
             Ten en cuenta que es una persona mayor. Prioriza explicaciones claras y riesgos comunes. \
             Sugiere posibles preguntas que puede hacerle a su médico en la consulta. \
             Haz énfasis en resultados relacionados con glucosa, función renal y dieta.\n\n\
             Texto del informe médico:\nHemoglobina 13.5"
        );
    }

    #[test]
    fn empty_profile_contributes_no_fragments() {
        let prompt = build_prompt("", &Profile::default());
        assert_eq!(
            prompt,
            "Eres un asistente médico experto. El paciente tiene  años, con estudios . \
             Tiene como objetivo: . \
             Condiciones médicas relevantes: ninguna. \
             Instrucciones: \n\n\
             Texto del informe médico:\n"
        );
        assert!(instruction_fragments(&Profile::default()).is_empty());
    }

    #[test]
    fn comorbidities_only_change_their_own_fragments() {
        let base = sample_profile();
        let mut with_more = base.clone();
        with_more.comorbidities.insert(Comorbidity::Asthma);

        let base_fragments = instruction_fragments(&base);
        let more_fragments = instruction_fragments(&with_more);
        assert_eq!(more_fragments.len(), base_fragments.len() + 1);
        assert_eq!(&more_fragments[..base_fragments.len()], &base_fragments[..]);
        assert!(more_fragments
            .last()
            .unwrap()
            .starts_with("Relaciona los hallazgos con síntomas respiratorios"));
    }

    #[test]
    fn comorbidity_fragments_follow_the_checklist_not_input_order() {
        let forward = Profile {
            comorbidities: [Comorbidity::Diabetes, Comorbidity::KidneyFailure, Comorbidity::Smoking]
                .into_iter()
                .collect(),
            ..Profile::default()
        };
        let reversed = Profile {
            comorbidities: [Comorbidity::Smoking, Comorbidity::KidneyFailure, Comorbidity::Diabetes]
                .into_iter()
                .collect(),
            ..Profile::default()
        };
        assert_eq!(build_prompt("x", &forward), build_prompt("x", &reversed));

        let fragments = instruction_fragments(&forward);
        assert!(fragments[0].contains("glucosa"));
        assert!(fragments[1].contains("tabaquismo"));
        assert!(fragments[2].contains("creatinina"));
    }

    #[test]
    fn each_goal_selects_exactly_one_fragment() {
        for goal in Goal::ALL {
            let profile = Profile {
                goal: Some(goal),
                ..Profile::default()
            };
            assert_eq!(instruction_fragments(&profile).len(), 1, "goal {:?}", goal);
        }
    }

    #[test]
    fn healthcare_background_adds_technical_depth() {
        let profile = Profile {
            education: Some(EducationLevel::HealthcareBackground),
            ..Profile::default()
        };
        let prompt = build_prompt("x", &profile);
        assert!(prompt.contains("con estudios estudios/experiencia sanitaria."));
        assert!(prompt.contains("puedes profundizar en los aspectos técnicos"));
    }

    #[test]
    fn truncate_report_respects_char_boundaries() {
        assert_eq!(truncate_report("colesterol", 100), "colesterol");
        assert_eq!(truncate_report("glucemia", 4), "gluc");
        assert_eq!(truncate_report("ñandú", 2), "ña");
        assert_eq!(truncate_report("", 0), "");
    }
}
