use crate::cli::DofsArgs;
use crate::config::load_dof_requests;
use crate::error::{CliError, Result};
use confsearch::core::conformer::molecule::{Molecule, MoleculeError};
use confsearch::core::dof::Dof;
use confsearch::core::io::sdf::SdfFile;
use confsearch::core::io::traits::MolecularFile;
use confsearch::core::topology::locator::TopologyLocator;
use tracing::info;

pub fn run(args: DofsArgs) -> Result<()> {
    let requests = load_dof_requests(args.config.as_deref(), &args.kind)?;

    info!("Loading molecule from {:?}", &args.input);
    let (template, _) =
        SdfFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?;

    match Molecule::new(template, &requests, &TopologyLocator) {
        Ok(molecule) => {
            for dof in &molecule.dofs {
                print!("{}", describe(dof));
            }
            Ok(())
        }
        Err(MoleculeError::NoDegreesOfFreedom) => {
            println!("No degrees of freedom found.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// One header line per DOF, then one line per site with 1-based atom numbers.
fn describe(dof: &Dof) -> String {
    let positions = dof.positions();
    let mut out = format!("{} ({} site(s))\n", dof.kind(), positions.len());
    for tuple in positions {
        let atoms: Vec<String> = tuple.iter().map(|atom| (atom + 1).to_string()).collect();
        out.push_str(&format!("  {}\n", atoms.join("-")));
    }
    out
}
