//! Terminal rendering for registry entries.
//!
//! `show` prints one kindergarten as a vertical card grouped by section;
//! `list` prints one line per kindergarten.

use std::fmt::Write;

use barnehage_core::{Kindergarten, SpotRecord};
use barnehage_store::ListingPage;

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

/// Print a single kindergarten as a vertical card grouped by section.
pub fn print_card(kindergarten: &Kindergarten) {
    print!("{}", render_card(kindergarten));
}

/// Print one page of a listing, one line per kindergarten.
pub fn print_listing(page: &ListingPage) {
    print!("{}", render_listing(page));
}

// ── Card ──

type Field = (&'static str, Option<String>);

fn render_card(k: &Kindergarten) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", k.navn);
    let _ = writeln!(out, "{}", k.orgnr);
    out.push('\n');

    section(
        &mut out,
        "Location",
        &[
            (
                "coordinates",
                k.koordinat_lat_lng.map(|[lat, lng]| format!("{lat:.5}, {lng:.5}")),
            ),
            ("fylkesnummer", k.fylkesnummer.clone()),
            ("kommunenummer", k.kommunenummer.clone()),
        ],
    );

    if let Some(d) = &k.details {
        let address = d.besoks_adresse.as_ref().map(|a| {
            [&a.adresselinje, &a.postnr, &a.poststed]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        });
        section(
            &mut out,
            "Details",
            &[
                ("type", d.kind.clone()),
                ("alder", d.alder.clone()),
                ("eierform", d.eierform.clone()),
                ("privat", d.er_privat_barnehage.map(yes_no)),
                ("adresse", address.filter(|a| !a.is_empty())),
                ("malform", d.malform.as_ref().and_then(|m| m.malform_navn.clone())),
                (
                    "apningstid",
                    d.apningstid_fra
                        .as_ref()
                        .zip(d.apningstid_til.as_ref())
                        .map(|(fra, til)| format!("{fra}-{til}")),
                ),
                ("kostpenger", d.kostpenger.map(number)),
                (
                    "pedagogisk profil",
                    (!d.pedagogisk_profil.is_empty()).then(|| d.pedagogisk_profil.join(", ")),
                ),
            ],
        );

        let s = &d.statistics;
        section(
            &mut out,
            "Statistics",
            &[
                ("antall barn", s.antall_barn.map(number)),
                ("barn per ansatt", s.antall_barn_per_ansatt.map(number)),
                ("barn per barnehagelaerer", s.antall_barn_per_barnehagelaerer.map(number)),
                ("lekeareal per barn (m2)", s.leke_og_oppholdsareal_per_barn.map(number)),
                ("areal (m2)", s.total_antall_kvadratmeter.map(number)),
            ],
        );

        let staff = &d.staff;
        section(
            &mut out,
            "Staff (%)",
            &[
                ("barnehagelaerer", staff.barnehagelaerer.map(number)),
                ("barne- og ungdomsarbeider", staff.barne_og_ungdomsarbeiderfag.map(number)),
                ("tilsvarende barnehagelaerer", staff.tilsvarende_barnehagelaerer.map(number)),
                ("annen hoyere utdanning", staff.annen_hoyere_utdanning.map(number)),
                ("annen pedagogisk", staff.annen_pedagogisk_utdanning.map(number)),
                ("annen fagarbeider", staff.annen_fagarbeiderutdanning.map(number)),
                ("annen bakgrunn", staff.annen_bakgrunn.map(number)),
            ],
        );

        if let Some(survey) = &d.foreldreundersokelse {
            section(
                &mut out,
                "Parent Survey",
                &[
                    ("argang", survey.argang.clone()),
                    ("tilfredshet", survey.tilfredshet.map(number)),
                    ("trivsel", survey.barnets_trivsel.map(number)),
                    ("utvikling", survey.barnets_utvikling.map(number)),
                    ("ute- og innemiljo", survey.ute_og_inne_miljo.map(number)),
                    ("informasjon", survey.informasjon.map(number)),
                    ("svarprosent", survey.svarprosent.map(number)),
                ],
            );
        }
    }

    history(&mut out, &k.spot_history);
    out
}

fn section(out: &mut String, header: &str, fields: &[Field]) {
    if fields.iter().all(|(_, value)| value.is_none()) {
        return;
    }
    let _ = writeln!(out, "{header}");
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "  {label:<28} {value}");
        }
    }
    out.push('\n');
}

fn history(out: &mut String, records: &[SpotRecord]) {
    if records.is_empty() {
        return;
    }
    let _ = writeln!(out, "Spot History ({}):", records.len());

    // Newest first.
    for r in records.iter().rev().take(MAX_LIST_ITEMS) {
        let _ = writeln!(
            out,
            "  {:<9} {:>2} x {:<13} {:<14} {:<14} seen {}",
            r.status.as_str(),
            r.spots,
            r.age_group.as_str(),
            r.availability_date,
            r.region,
            r.last_seen_at.format("%Y-%m-%d %H:%M"),
        );
    }
    if records.len() > MAX_LIST_ITEMS {
        let _ = writeln!(out, "  ... and {} more", records.len() - MAX_LIST_ITEMS);
    }
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

fn number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

// ── Listing ──

fn render_listing(page: &ListingPage) -> String {
    let mut out = String::new();
    for k in &page.data {
        let open: Vec<String> = k
            .available_spots()
            .map(|r| format!("{} x {} ({})", r.spots, r.age_group, r.availability_date))
            .collect();
        let open = if open.is_empty() {
            "-".to_string()
        } else {
            open.join("; ")
        };
        let _ = writeln!(out, "{:<10} {:<40} {}", k.orgnr, truncate(&k.navn, 40), open);
    }
    let _ = writeln!(
        out,
        "\n{} of {} (offset {})",
        page.data.len(),
        page.total,
        page.offset
    );
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max - 3).collect();
    format!("{cut}...")
}
