use super::read_structure;
use crate::cli::MaskArgs;
use crate::error::Result;
use ambprep::core::library::registry::ReferenceLibrary;
use ambprep::engine::config::MinimizationConfig;
use ambprep::engine::minimization::MinimizationInput;
use ambprep::engine::tasks::restraint;
use tracing::info;

pub fn run(args: MaskArgs) -> Result<()> {
    let before = read_structure(&args.before)?;
    let after = read_structure(&args.after)?;

    // Solvent and ions follow the solute in the build output.
    let solute = after.leading_residues(before.residue_count());
    let mask = restraint::added_atoms_mask(&before, &solute, args.strategy)?;

    if mask.is_empty() {
        println!("No atoms were added by the build.");
    } else {
        println!("Added atoms ({}): {}", mask.len(), mask);
    }

    if let Some(path) = &args.min_input {
        MinimizationInput::new(MinimizationConfig::default())
            .with_belly_mask(mask.to_string())
            .write_to_path(path)?;
        info!("Minimization input written to {:?}", path);
        println!("✓ Minimization input written to: {}", path.display());
    }

    if let Some(library_path) = &args.library {
        let library = ReferenceLibrary::load(library_path)?;
        let regions = restraint::region_masks(&after, &library, &args.ligand_residue);
        let describe = |mask: &Option<String>| mask.as_deref().unwrap_or("-").to_string();
        println!("Protein: {}", describe(&regions.protein));
        println!("Ligand:  {}", describe(&regions.ligand));
        println!("Water:   {}", describe(&regions.water));
    }
    Ok(())
}
