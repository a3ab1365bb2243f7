use serde::Deserialize;

use crate::{
    oracle::{
        error::{OracleError, contract_violation},
        types::{OracleAnswer, OracleQueryKind, StateChoice},
    },
    world_model::CoreVariableRelation,
};

#[derive(Deserialize)]
struct VariabilityOutput {
    variability: String,
}

#[derive(Deserialize)]
struct AlwaysSafeOutput {
    is_always_safe: bool,
}

#[derive(Deserialize)]
struct ParamRangeOutput {
    #[serde(default)]
    param_range: Option<String>,
}

#[derive(Deserialize)]
struct WithinRangeOutput {
    is_within_range: bool,
}

#[derive(Deserialize)]
struct MatchStateOutput {
    index: i64,
    #[serde(default)]
    new_effective_state: String,
}

#[derive(Deserialize)]
struct NextStateOutput {
    index: i64,
    #[serde(default)]
    new_next_effective_state: String,
}

#[derive(Deserialize)]
struct VariationOutput {
    #[serde(default)]
    actual_variation: String,
}

#[derive(Deserialize)]
struct BoundsOutput {
    is_beyond_bounds: bool,
}

#[derive(Deserialize)]
struct AffectsOutput {
    #[serde(default)]
    potential_relations: Vec<CoreVariableRelation>,
}

/// Decodes the model's reply text for a query of `kind`.
pub fn decode_answer(kind: OracleQueryKind, text: &str) -> Result<OracleAnswer, OracleError> {
    let answer = match kind {
        OracleQueryKind::CoreVariableVariability => {
            let output: VariabilityOutput = parse_json_output(kind, text)?;
            OracleAnswer::Variability {
                variability: output.variability,
            }
        }
        OracleQueryKind::IsAlwaysSafe => {
            let output: AlwaysSafeOutput = parse_json_output(kind, text)?;
            OracleAnswer::Verdict {
                value: output.is_always_safe,
            }
        }
        OracleQueryKind::UsualParamRange => {
            let output: ParamRangeOutput = parse_json_output(kind, text)?;
            OracleAnswer::ParamRange {
                param_range: output.param_range,
            }
        }
        OracleQueryKind::IsParamWithinRange => {
            let output: WithinRangeOutput = parse_json_output(kind, text)?;
            OracleAnswer::Verdict {
                value: output.is_within_range,
            }
        }
        OracleQueryKind::MatchEffectiveState => {
            let output: MatchStateOutput = parse_json_output(kind, text)?;
            OracleAnswer::StateChoice(StateChoice {
                index: output.index,
                new_state: output.new_effective_state,
            })
        }
        OracleQueryKind::NextEffectiveState => {
            let output: NextStateOutput = parse_json_output(kind, text)?;
            OracleAnswer::StateChoice(StateChoice {
                index: output.index,
                new_state: output.new_next_effective_state,
            })
        }
        OracleQueryKind::ActualVariation => {
            let output: VariationOutput = parse_json_output(kind, text)?;
            OracleAnswer::Variation {
                variation: output.actual_variation,
            }
        }
        OracleQueryKind::IsVariationBeyondBounds => {
            let output: BoundsOutput = parse_json_output(kind, text)?;
            OracleAnswer::Verdict {
                value: output.is_beyond_bounds,
            }
        }
        OracleQueryKind::StateAffectsCoreVariables => {
            let output: AffectsOutput = parse_json_output(kind, text)?;
            OracleAnswer::Relations {
                relations: output.potential_relations,
            }
        }
    };
    Ok(answer)
}

fn parse_json_output<T: for<'a> Deserialize<'a>>(
    kind: OracleQueryKind,
    text: &str,
) -> Result<T, OracleError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(contract_violation(kind, "empty JSON output"));
    }

    let first_err = match serde_json::from_str::<T>(trimmed) {
        Ok(parsed) => return Ok(parsed),
        Err(err) => err,
    };

    if let Some(stripped) = strip_code_fence(trimmed)
        && let Ok(parsed) = serde_json::from_str::<T>(&stripped)
    {
        return Ok(parsed);
    }

    Err(contract_violation(
        kind,
        format!("failed to parse JSON output: {first_err}"),
    ))
}

fn strip_code_fence(text: &str) -> Option<String> {
    let text = text.trim();
    if !text.starts_with("```") {
        return None;
    }

    let mut lines = text.lines();
    let _first = lines.next()?;
    let mut body = Vec::new();
    for line in lines {
        if line.trim_start().starts_with("```") {
            break;
        }
        body.push(line);
    }
    Some(body.join("\n"))
}
