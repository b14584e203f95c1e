//! Runs the three scenario queries on the reference sediment network: a forward prediction, a
//! diagnostic query from an observed effect, and a comparison of sensitive and robust benthic
//! communities under the same exposure.
//!
//! Run with `cargo run --example sediment`.

use sedrisk::model::sediment::{self, *};
use sedrisk::{Evidence, Result, VariableElimination};

fn main() -> Result<()> {
    /////////////////////////////////////////////////////
    // Step 1: Build the reference network
    let model = sediment::build()?;
    let engine = VariableElimination::new(&model);

    /////////////////////////////////////////////////////
    // Step 2: Forward prediction. High contamination, low organic carbon, sensitive community
    let exposure = Evidence::from_labels(&model, vec![
        (CONTAMINANT_CONC, "High"),
        (TOC, "Low"),
        (BENTHIC_COMMUNITY_TYPE, "Sensitive"),
    ])?;

    let posterior = engine.query(&[ECOLOGICAL_EFFECT], &exposure)?;
    println!("P(Ecological_Effect | Contaminant_Conc=High, TOC=Low, Benthic_Community_Type=Sensitive)");
    println!("{}", posterior);

    let (state, p) = posterior.argmax_state()?;
    println!("Predicted effect: {} ({:.4})\n", state, p);

    /////////////////////////////////////////////////////
    // Step 3: Diagnostic query. No effect was observed, how contaminated was the sediment?
    let no_effect = Evidence::from_labels(&model, vec![(ECOLOGICAL_EFFECT, "None")])?;

    let posterior = engine.query(&[CONTAMINANT_CONC], &no_effect)?;
    println!("P(Contaminant_Conc | Ecological_Effect=None)");
    println!("{}", posterior);

    /////////////////////////////////////////////////////
    // Step 4: Sensitivity. The same exposure, robust versus sensitive communities
    for benthic in ["Robust", "Sensitive"].iter() {
        let evidence = Evidence::from_labels(&model, vec![
            (CONTAMINANT_CONC, "High"),
            (TOC, "Low"),
            (BENTHIC_COMMUNITY_TYPE, *benthic),
        ])?;

        let posterior = engine.query(&[ECOLOGICAL_EFFECT], &evidence)?;
        let severe = posterior.probability(&[(ECOLOGICAL_EFFECT, "Severe")])?;
        println!("P(Ecological_Effect=Severe | {} community) = {:.4}", benthic, severe);
    }

    Ok(())
}
