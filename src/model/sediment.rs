//! The reference sediment quality network.
//!
//! Relates sediment contaminants, environmental modifiers and receptor sensitivity to ecological
//! effects in aquatic ecosystems. The probabilities are illustrative and hand authored; they are
//! not fitted to data.
//!
//! ```text
//! Contaminant_Conc   TOC   Grain_Size
//!              \      |      /
//!             Bioavailability    Benthic_Community_Type
//!                          \       /
//!                      Ecological_Effect
//!                        /          \
//!          Mortality_Growth    Community_Richness
//! ```

use crate::cpd::Cpd;
use crate::model::directed::{DirectedModel, DirectedModelBuilder};
use crate::util::Result;
use crate::variable::Variable;

pub const CONTAMINANT_CONC: &str = "Contaminant_Conc";
pub const TOC: &str = "TOC";
pub const GRAIN_SIZE: &str = "Grain_Size";
pub const BENTHIC_COMMUNITY_TYPE: &str = "Benthic_Community_Type";
pub const BIOAVAILABILITY: &str = "Bioavailability";
pub const ECOLOGICAL_EFFECT: &str = "Ecological_Effect";
pub const MORTALITY_GROWTH: &str = "Mortality_Growth";
pub const COMMUNITY_RICHNESS: &str = "Community_Richness";

/// The edges of the network
pub const EDGES: [(&str, &str); 7] = [
    (CONTAMINANT_CONC, BIOAVAILABILITY),
    (TOC, BIOAVAILABILITY),
    (GRAIN_SIZE, BIOAVAILABILITY),
    (BIOAVAILABILITY, ECOLOGICAL_EFFECT),
    (BENTHIC_COMMUNITY_TYPE, ECOLOGICAL_EFFECT),
    (ECOLOGICAL_EFFECT, MORTALITY_GROWTH),
    (ECOLOGICAL_EFFECT, COMMUNITY_RICHNESS),
];

/// The `Variable`s of the network, roots first
pub fn variables() -> Result<Vec<Variable>> {
    Ok(vec![
        Variable::new(CONTAMINANT_CONC, vec!["Low", "Medium", "High"])?,
        Variable::new(TOC, vec!["Low", "High"])?,
        Variable::new(GRAIN_SIZE, vec!["Coarse", "Fine"])?,
        // Sensitive: e.g. EPT-dominated communities
        Variable::new(BENTHIC_COMMUNITY_TYPE, vec!["Robust", "Sensitive"])?,
        Variable::new(BIOAVAILABILITY, vec!["Low", "High"])?,
        Variable::new(ECOLOGICAL_EFFECT, vec!["None", "Moderate", "Severe"])?,
        Variable::new(MORTALITY_GROWTH, vec!["Normal", "Impaired"])?,
        Variable::new(COMMUNITY_RICHNESS, vec!["High", "Low"])?,
    ])
}

/// Build and validate the reference network
pub fn build() -> Result<DirectedModel> {
    let vars = variables()?;
    let (conc, toc, grain, benthic, bio, effect, mortality, richness) = (
        vars[0].clone(), vars[1].clone(), vars[2].clone(), vars[3].clone(),
        vars[4].clone(), vars[5].clone(), vars[6].clone(), vars[7].clone(),
    );

    let priors = vec![
        Cpd::prior(conc.clone(), vec![0.6, 0.3, 0.1])?,
        Cpd::prior(toc.clone(), vec![0.5, 0.5])?,
        Cpd::prior(grain.clone(), vec![0.5, 0.5])?,
        Cpd::prior(benthic.clone(), vec![0.6, 0.4])?,
    ];

    // Bioavailability is highest with high contamination, low TOC and coarse grains, and lowest
    // with low contamination, high TOC and fine grains.
    let bioavailability = Cpd::new(
        bio.clone(),
        vec![conc, toc, grain],
        vec![
            //   C=Low                    C=Medium                 C=High
            vec![0.99, 0.95, 0.90, 0.80, 0.80, 0.60, 0.50, 0.30, 0.40, 0.20, 0.10, 0.05],
            vec![0.01, 0.05, 0.10, 0.20, 0.20, 0.40, 0.50, 0.70, 0.60, 0.80, 0.90, 0.95],
        ]
    )?;

    // Severe effects are most probable with high bioavailability and a sensitive community.
    let ecological_effect = Cpd::new(
        effect.clone(),
        vec![bio, benthic],
        vec![
            vec![0.90, 0.70, 0.20, 0.05],
            vec![0.09, 0.25, 0.60, 0.35],
            vec![0.01, 0.05, 0.20, 0.60],
        ]
    )?;

    let mortality_growth = Cpd::new(
        mortality,
        vec![effect.clone()],
        vec![vec![0.98, 0.40, 0.10], vec![0.02, 0.60, 0.90]]
    )?;

    let community_richness = Cpd::new(
        richness,
        vec![effect],
        vec![vec![0.95, 0.30, 0.05], vec![0.05, 0.70, 0.95]]
    )?;

    let builder = vars.into_iter().fold(DirectedModelBuilder::new(), |b, v| b.with_variable(v));
    priors.into_iter()
          .chain(vec![bioavailability, ecological_effect, mortality_growth, community_richness])
          .fold(builder.with_edges(EDGES.iter().cloned()), |b, cpd| b.with_cpd(cpd))
          .build()
}
