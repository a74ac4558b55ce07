use serde::Serialize;

/// One monitored phase of the Susenas workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub id: &'static str,
    /// Path segment under the portal's progress base URL.
    pub path: &'static str,
    /// Name shown on the dashboard and persisted as `tahapan`.
    pub display_name: &'static str,
}

/// Processing and display order.
pub static STAGES: [Stage; 8] = [
    Stage {
        id: "pemutakhiran",
        path: "pemutakhiran",
        display_name: "Pemutakhiran",
    },
    Stage {
        id: "pencacahan",
        path: "pencacahan",
        display_name: "Pencacahan",
    },
    Stage {
        id: "pemeriksaan",
        path: "edcod",
        display_name: "Pemeriksaan",
    },
    Stage {
        id: "pengiriman-kabkota",
        path: "pengiriman",
        display_name: "Pengiriman ke KabKota",
    },
    Stage {
        id: "penerimaan-kabkota",
        path: "penerimaan",
        display_name: "Penerimaan di KabKota",
    },
    Stage {
        id: "penerimaan-ipds",
        path: "ipds",
        display_name: "Penerimaan di IPDS",
    },
    Stage {
        id: "pengolahan-k",
        path: "pengolahan",
        display_name: "Pengolahan Dokumen K",
    },
    Stage {
        id: "pengolahan-kp",
        path: "pengolahan2",
        display_name: "Pengolahan Dokumen KP",
    },
];
