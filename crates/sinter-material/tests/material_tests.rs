//! Integration tests for sinter-material.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use sinter_material::{
    InterfaceProperties, MaterialDatabase, MaterialProperties, MaterialTable, ProcessConditions,
};
use sinter_types::constants::GAS_CONSTANT;
use sinter_types::{MaterialId, SinterError};

fn test_material(surface_energy: f64) -> MaterialProperties {
    MaterialProperties {
        name: "test".into(),
        molar_volume: 1.0e-5,
        surface_energy,
        surface_diffusion_coefficient: 1.0e-22,
        vacancy_concentration: 1.0e-4,
        grain_boundary_energy: 0.5,
        grain_boundary_diffusion_coefficient: 1.0e-23,
    }
}

// ─── MaterialProperties Tests ─────────────────────────────────

#[test]
fn mobility_formula() {
    let m = test_material(1.0);
    let mobility = m.surface_mobility(1000.0, GAS_CONSTANT);
    let expected = 1.0e-4 * 1.0e-5 * 1.0e-22 / (GAS_CONSTANT * 1000.0);
    assert_relative_eq!(mobility, expected, max_relative = 1e-12);
}

#[test]
fn non_positive_parameter_is_rejected() {
    let mut m = test_material(1.0);
    m.vacancy_concentration = 0.0;
    let err = m.validate().unwrap_err();
    assert!(err.to_string().contains("vacancy_concentration"));
}

// ─── Dihedral Angle Tests ─────────────────────────────────────

#[test]
fn symmetric_dihedral_angle() {
    let m = test_material(1.0);
    let interface = InterfaceProperties::homophase(MaterialId(0), &m);
    let angle = interface.dihedral_angle(&m, &m).unwrap();
    let expected = (0.5f64 / 2.0).acos();
    assert_relative_eq!(angle.first, expected, epsilon = 1e-10);
    assert_relative_eq!(angle.second, expected, epsilon = 1e-10);
    assert_relative_eq!(angle.total(), 2.0 * expected, epsilon = 1e-10);
}

#[test]
fn asymmetric_dihedral_angle_balances_forces() {
    let a = test_material(1.0);
    let b = test_material(1.4);
    let interface = InterfaceProperties {
        first: MaterialId(0),
        second: MaterialId(1),
        energy: 0.8,
        diffusion_coefficient: 1.0e-23,
    };
    let angle = interface.dihedral_angle(&a, &b).unwrap();
    assert_relative_eq!(
        1.0 * angle.first.cos() + 1.4 * angle.second.cos(),
        0.8,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        1.0 * angle.first.sin(),
        1.4 * angle.second.sin(),
        epsilon = 1e-9
    );
    assert!(angle.first > angle.second);
    assert!(angle.total() < PI);
}

#[test]
fn excessive_interface_energy_has_no_equilibrium() {
    let m = test_material(1.0);
    let interface = InterfaceProperties {
        first: MaterialId(0),
        second: MaterialId(0),
        energy: 2.5,
        diffusion_coefficient: 1.0e-23,
    };
    assert!(matches!(
        interface.dihedral_angle(&m, &m),
        Err(SinterError::InvalidMaterial(_))
    ));
}

// ─── MaterialTable Tests ──────────────────────────────────────

#[test]
fn homophase_interface_falls_back_to_grain_boundary_data() {
    let table = MaterialTable::single(test_material(1.0));
    let interface = table.interface(MaterialId(0), MaterialId(0)).unwrap();
    assert_eq!(interface.energy, 0.5);
    assert_eq!(interface.diffusion_coefficient, 1.0e-23);
}

#[test]
fn heterophase_interface_must_be_explicit() {
    let table = MaterialTable::single(test_material(1.0))
        .with_material(MaterialId(1), test_material(1.2));
    let err = table.interface(MaterialId(0), MaterialId(1)).unwrap_err();
    assert!(err.is_structural());

    let table = table.with_interface(InterfaceProperties {
        first: MaterialId(1),
        second: MaterialId(0),
        energy: 0.7,
        diffusion_coefficient: 1.0e-23,
    });
    let interface = table.interface(MaterialId(0), MaterialId(1)).unwrap();
    assert_eq!(interface.energy, 0.7);
    assert!(table.validate().is_ok());
}

#[test]
fn missing_material_is_structural() {
    let table = MaterialTable::single(test_material(1.0));
    assert!(table.material(MaterialId(3)).unwrap_err().is_structural());
    assert!(MaterialTable::new().validate().is_err());
}

#[test]
fn table_toml_round_trip() {
    let table = MaterialTable::single(test_material(1.0));
    let text = toml::to_string(&table).unwrap();
    let back: MaterialTable = toml::from_str(&text).unwrap();
    assert_eq!(back.materials.len(), 1);
    assert_eq!(back.material(MaterialId(0)).unwrap().surface_energy, 1.0);
}

// ─── MaterialDatabase Tests ───────────────────────────────────

#[test]
fn default_presets() {
    let db = MaterialDatabase::with_defaults();
    assert_eq!(db.len(), 3);
    assert_eq!(db.names(), vec!["alumina", "copper", "zirconia"]);
    for name in db.names() {
        let material = db.get(name).unwrap();
        material.validate().unwrap();
        let table = MaterialTable::single(material.clone());
        let angle = table.dihedral_angle(MaterialId(0), MaterialId(0)).unwrap();
        assert!(angle.total() > 0.0 && angle.total() < PI);
    }
}

#[test]
fn custom_material_registration() {
    let mut db = MaterialDatabase::empty();
    assert!(db.is_empty());
    db.register(test_material(1.0));
    assert!(db.get("test").is_some());
}

// ─── ProcessConditions Tests ──────────────────────────────────

#[test]
fn conditions_default_gas_constant_from_toml() {
    let c: ProcessConditions = toml::from_str("temperature = 1500.0\nduration = 60.0").unwrap();
    assert_eq!(c.gas_constant, GAS_CONSTANT);
    assert_relative_eq!(c.thermal_energy(), GAS_CONSTANT * 1500.0);
}

#[test]
fn negative_duration_is_allowed() {
    let c = ProcessConditions::new(1500.0, -1.0);
    assert!(c.validate().is_ok());
    assert!(ProcessConditions::new(0.0, 1.0).validate().is_err());
}
