// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_atom_site(atoms: usize) -> String {
    let mut content = String::from(
        "data_BENCH\n#\n_entry.id BENCH\n#\nloop_\n_atom_site.group_PDB\n_atom_site.id\n_atom_site.type_symbol\n_atom_site.label_atom_id\n_atom_site.label_comp_id\n_atom_site.label_seq_id\n_atom_site.Cartn_x\n_atom_site.Cartn_y\n_atom_site.Cartn_z\n_atom_site.occupancy\n",
    );
    let names = [("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")];

    for i in 0..atoms {
        let (atom, element) = names[i % names.len()];
        content.push_str(&format!(
            "ATOM {} {element} {atom} ALA {} {:.3} {:.3} {:.3} 1.00\n",
            i + 1,
            i / names.len() + 1,
            i as f64 * 0.5,
            -(i as f64) * 0.25,
            (i % 17) as f64 * 1.5,
        ));
    }
    content.push_str("#\n");
    content
}

#[allow(dead_code)]
pub fn generate_text_fields(count: usize) -> String {
    let mut content = String::from("data_TEXT\nloop_\n_note.id\n_note.text\n");
    for i in 0..count {
        content.push_str(&format!(
            "{i}\n;Some remark spanning\nmore than one line, with 'quotes' in it.\n;\n"
        ));
    }
    content
}
