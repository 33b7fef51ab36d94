//! Helpers shared by several commands.

use std::collections::HashSet;

use cadence_core::{ParamKind, ParamSpec, ParamValue, StageControl};

/// One `--set STAGE.PARAM=VALUE[@SECONDS]` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    /// Stage instance name.
    pub stage: String,
    /// Parameter name.
    pub param: String,
    /// New value.
    pub value: ParamValue,
    /// Time in seconds at which the value takes effect.
    pub at: f64,
}

impl ParamUpdate {
    /// First frame processed with the new value.
    pub fn frame(&self, sample_rate: u32) -> usize {
        (self.at * f64::from(sample_rate)).round() as usize
    }
}

pub fn parse_update(s: &str) -> Result<ParamUpdate, String> {
    let (target, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid update '{s}' (expected stage.param=value)"))?;
    let (stage, param) = target
        .rsplit_once('.')
        .filter(|(stage, param)| !stage.is_empty() && !param.is_empty())
        .ok_or_else(|| format!("invalid target '{target}' (expected stage.param)"))?;

    let (value, at) = match rest.rsplit_once('@') {
        Some((value, time)) => {
            let at: f64 = time
                .trim()
                .parse()
                .map_err(|_| format!("invalid time '{time}' in '{s}'"))?;
            if !at.is_finite() || at < 0.0 {
                return Err(format!("time must be a non-negative number of seconds: '{time}'"));
            }
            (value, at)
        }
        None => (rest, 0.0),
    };

    Ok(ParamUpdate {
        stage: stage.to_string(),
        param: param.to_string(),
        value: ParamValue::parse(value),
        at,
    })
}

/// Check every update against the chain's controls before audio starts.
pub fn check_updates(
    updates: &[ParamUpdate],
    controls: &[std::sync::Arc<dyn StageControl>],
) -> anyhow::Result<()> {
    let names: HashSet<&str> = controls.iter().map(|c| c.stage()).collect();
    for update in updates {
        let control = controls
            .iter()
            .find(|c| c.stage() == update.stage)
            .ok_or_else(|| {
                let mut known: Vec<_> = names.iter().copied().collect();
                known.sort_unstable();
                anyhow::anyhow!(
                    "no stage named '{}' (stages: {})",
                    update.stage,
                    known.join(", ")
                )
            })?;
        let spec = control
            .params()
            .into_iter()
            .find(|p| p.name == update.param)
            .ok_or_else(|| {
                anyhow::anyhow!("stage '{}' has no parameter '{}'", update.stage, update.param)
            })?;
        spec.validate(&update.stage, update.value.clone())?;
    }
    Ok(())
}

/// Human-readable range of a parameter.
pub fn describe_range(spec: &ParamSpec) -> String {
    let unit = spec.unit.suffix();
    match &spec.kind {
        ParamKind::Bool => "true/false".to_string(),
        ParamKind::Int { min, max } => format!("{min}..{max}{unit}"),
        ParamKind::Float { min, max } => format!("{min}..{max}{unit}"),
        ParamKind::Vector { min, max } => format!("[{min}..{max}]{unit}"),
        ParamKind::Choice(choices) => choices.join("|"),
        ParamKind::Text => "text".to_string(),
    }
}

pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        -120.0
    } else {
        cadence_stages::linear_to_db(linear)
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_updates() {
        let update = parse_update("pre.gain_db=-6").unwrap();
        assert_eq!(update.stage, "pre");
        assert_eq!(update.param, "gain_db");
        assert_eq!(update.value, ParamValue::Int(-6));
        assert_eq!(update.at, 0.0);

        let update = parse_update("echo.feedback=0.4@1.5").unwrap();
        assert_eq!(update.value, ParamValue::Float(0.4));
        assert_eq!(update.at, 1.5);
        assert_eq!(update.frame(48000), 72000);

        let update = parse_update("agc.source=in.meter.level").unwrap();
        assert_eq!(update.value, ParamValue::Text("in.meter.level".to_string()));
    }

    #[test]
    fn stage_names_may_contain_dots() {
        let update = parse_update("a.b.mute=true").unwrap();
        assert_eq!(update.stage, "a.b");
        assert_eq!(update.param, "mute");
        assert_eq!(update.value, ParamValue::Bool(true));
    }

    #[test]
    fn rejects_malformed_updates() {
        assert!(parse_update("gain").is_err());
        assert!(parse_update("gain=3").is_err());
        assert!(parse_update(".gain_db=3").is_err());
        assert!(parse_update("gain.gain_db=3@soon").is_err());
        assert!(parse_update("gain.gain_db=3@-1").is_err());
    }

    #[test]
    fn ranges_are_readable() {
        let spec = ParamSpec::gain_db("gain_db", -60.0, 24.0, 0.0);
        assert_eq!(describe_range(&spec), "-60..24 dB");
        let spec = ParamSpec::choice("mode", &["average", "sum"], "average");
        assert_eq!(describe_range(&spec), "average|sum");
    }

    #[test]
    fn levels() {
        assert_eq!(linear_to_db(0.0), -120.0);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert_eq!(peak(&[0.1, -0.7, 0.3]), 0.7);
        assert!((rms(&[1.0, -1.0]) - 1.0).abs() < 1e-6);
    }
}
