//! The ride-hailing schema: allow-listed tables, CRUD page definitions,
//! foreign-key lookups and the report dashboard queries.

use crate::crud::CrudPageConfig;
use crate::data_access::Record;
use crate::form::{FieldDescriptor, ForeignKeyLookup};
use crate::report::ReportDefinition;
use crate::sql::{KnownSchema, TableDef};

pub const PAYMENT_METHODS: &[&str] = &["cash", "e-wallet", "kartu"];

const TABLES: &[TableDef] = &[
    TableDef {
        name: "users",
        columns: &["user_id", "nama", "email", "no_hp", "password"],
    },
    TableDef {
        name: "admin",
        columns: &["admin_id", "nama", "email", "no_hp", "password"],
    },
    TableDef {
        name: "drivers",
        columns: &["driver_id", "user_id", "plat_nomor", "jenis_motor"],
    },
    TableDef {
        name: "orders",
        columns: &[
            "pesanan_id",
            "pelanggan_id",
            "driver_id",
            "titik_awal",
            "titik_tujuan",
            "jarak",
            "biaya",
        ],
    },
    TableDef {
        name: "payments",
        columns: &["payment_id", "pesanan_id", "metode", "jumlah"],
    },
];

pub const SCHEMA: KnownSchema = KnownSchema::new(TABLES);

fn column_text(record: &Record, name: &str) -> String {
    record
        .get(name)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn user_label(record: &Record) -> String {
    format!(
        "{} - {} ({})",
        column_text(record, "user_id"),
        column_text(record, "nama"),
        column_text(record, "no_hp")
    )
}

fn driver_label(record: &Record) -> String {
    format!(
        "{} - {} ({}) | {}",
        column_text(record, "driver_id"),
        column_text(record, "nama"),
        column_text(record, "no_hp"),
        column_text(record, "plat_nomor")
    )
}

fn order_label(record: &Record) -> String {
    format!(
        "{} - {} | {} -> {} | Rp{}",
        column_text(record, "pesanan_id"),
        column_text(record, "pelanggan"),
        column_text(record, "titik_awal"),
        column_text(record, "titik_tujuan"),
        column_text(record, "biaya")
    )
}

pub const USERS_LOOKUP: ForeignKeyLookup = ForeignKeyLookup {
    name: "users",
    query: "SELECT user_id, nama, no_hp FROM users ORDER BY user_id",
    id_column: "user_id",
    label: user_label,
};

pub const DRIVERS_LOOKUP: ForeignKeyLookup = ForeignKeyLookup {
    name: "drivers",
    query: "SELECT d.driver_id, u.nama, u.no_hp, d.plat_nomor \
            FROM drivers d \
            JOIN users u ON u.user_id = d.user_id \
            ORDER BY d.driver_id",
    id_column: "driver_id",
    label: driver_label,
};

pub const ORDERS_LOOKUP: ForeignKeyLookup = ForeignKeyLookup {
    name: "orders",
    query: "SELECT o.pesanan_id, p.nama AS pelanggan, o.titik_awal, o.titik_tujuan, o.biaya \
            FROM orders o \
            JOIN users p ON p.user_id = o.pelanggan_id \
            ORDER BY o.pesanan_id DESC",
    id_column: "pesanan_id",
    label: order_label,
};

const PERSON_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::text("nama", "Nama"),
    FieldDescriptor::text("email", "Email"),
    FieldDescriptor::text("no_hp", "No HP"),
    FieldDescriptor::password("password", "Password"),
];

pub const USERS_PAGE: CrudPageConfig = CrudPageConfig {
    title: "Users",
    table: "users",
    primary_key: "user_id",
    view_query: "SELECT user_id, nama, email, no_hp, password FROM users ORDER BY user_id DESC",
    fields: PERSON_FIELDS,
};

pub const DRIVERS_PAGE: CrudPageConfig = CrudPageConfig {
    title: "Drivers",
    table: "drivers",
    primary_key: "driver_id",
    view_query: "SELECT d.driver_id, d.user_id, u.nama AS nama_driver, u.no_hp, \
                 d.plat_nomor, d.jenis_motor \
                 FROM drivers d \
                 JOIN users u ON u.user_id = d.user_id \
                 ORDER BY d.driver_id DESC",
    fields: &[
        FieldDescriptor::foreign_key("user_id", "Pilih User (Driver)", &USERS_LOOKUP),
        FieldDescriptor::text("plat_nomor", "Plat Nomor"),
        FieldDescriptor::text("jenis_motor", "Jenis Motor"),
    ],
};

pub const ADMIN_PAGE: CrudPageConfig = CrudPageConfig {
    title: "Admin",
    table: "admin",
    primary_key: "admin_id",
    view_query: "SELECT admin_id, nama, email, no_hp, password FROM admin ORDER BY admin_id DESC",
    fields: PERSON_FIELDS,
};

pub const ORDERS_PAGE: CrudPageConfig = CrudPageConfig {
    title: "Orders",
    table: "orders",
    primary_key: "pesanan_id",
    view_query: "SELECT o.pesanan_id, o.pelanggan_id, p.nama AS pelanggan, \
                 o.driver_id, u.nama AS driver, o.titik_awal, o.titik_tujuan, o.jarak, o.biaya \
                 FROM orders o \
                 JOIN users p ON p.user_id = o.pelanggan_id \
                 JOIN drivers d ON d.driver_id = o.driver_id \
                 JOIN users u ON u.user_id = d.user_id \
                 ORDER BY o.pesanan_id DESC",
    fields: &[
        FieldDescriptor::foreign_key("pelanggan_id", "Pilih Pelanggan", &USERS_LOOKUP),
        FieldDescriptor::foreign_key("driver_id", "Pilih Driver", &DRIVERS_LOOKUP),
        FieldDescriptor::text("titik_awal", "Titik Awal"),
        FieldDescriptor::text("titik_tujuan", "Titik Tujuan"),
        FieldDescriptor::numeric("jarak", "Jarak (KM)"),
        FieldDescriptor::numeric("biaya", "Biaya"),
    ],
};

pub const PAYMENTS_PAGE: CrudPageConfig = CrudPageConfig {
    title: "Payments",
    table: "payments",
    primary_key: "payment_id",
    view_query: "SELECT pay.payment_id, pay.pesanan_id, p.nama AS pelanggan, \
                 u.nama AS driver, pay.metode, pay.jumlah \
                 FROM payments pay \
                 JOIN orders o ON o.pesanan_id = pay.pesanan_id \
                 JOIN users p ON p.user_id = o.pelanggan_id \
                 JOIN drivers d ON d.driver_id = o.driver_id \
                 JOIN users u ON u.user_id = d.user_id \
                 ORDER BY pay.payment_id DESC",
    fields: &[
        FieldDescriptor::foreign_key("pesanan_id", "Pilih Pesanan", &ORDERS_LOOKUP),
        FieldDescriptor::enumerated("metode", "Metode", PAYMENT_METHODS),
        FieldDescriptor::numeric("jumlah", "Jumlah"),
    ],
};

pub const REPORTS: &[ReportDefinition] = &[
    ReportDefinition {
        title: "1. Data Users",
        query: "SELECT user_id, nama, email, no_hp FROM users ORDER BY user_id",
    },
    ReportDefinition {
        title: "2. Data Admin",
        query: "SELECT admin_id, nama, email, no_hp FROM admin ORDER BY admin_id",
    },
    ReportDefinition {
        title: "3. Data Drivers",
        query: "SELECT d.driver_id, d.user_id, u.nama AS nama_driver, u.no_hp AS hp_driver, \
                d.plat_nomor, d.jenis_motor \
                FROM drivers d \
                JOIN users u ON u.user_id = d.user_id \
                ORDER BY d.driver_id",
    },
    ReportDefinition {
        title: "4. Data Pesanan",
        query: "SELECT pesanan_id, pelanggan_id, driver_id, titik_awal, titik_tujuan, jarak, biaya \
                FROM orders \
                ORDER BY pesanan_id DESC",
    },
    ReportDefinition {
        title: "5. Data Pembayaran",
        query: "SELECT payment_id, pesanan_id, metode, jumlah FROM payments ORDER BY payment_id DESC",
    },
    ReportDefinition {
        title: "6. Detail Pesanan",
        query: "SELECT o.pesanan_id, u_pel.nama AS pelanggan, u_drv.nama AS driver, \
                o.titik_awal, o.titik_tujuan, o.jarak, o.biaya \
                FROM orders o \
                JOIN users u_pel ON u_pel.user_id = o.pelanggan_id \
                JOIN drivers d ON d.driver_id = o.driver_id \
                JOIN users u_drv ON u_drv.user_id = d.user_id \
                ORDER BY o.pesanan_id DESC",
    },
    ReportDefinition {
        title: "7. Detail Pembayaran",
        query: "SELECT p.payment_id, p.pesanan_id, u_pel.nama AS pelanggan, \
                u_drv.nama AS driver, p.metode, p.jumlah \
                FROM payments p \
                JOIN orders o ON o.pesanan_id = p.pesanan_id \
                JOIN users u_pel ON u_pel.user_id = o.pelanggan_id \
                JOIN drivers d ON d.driver_id = o.driver_id \
                JOIN users u_drv ON u_drv.user_id = d.user_id \
                ORDER BY p.payment_id DESC",
    },
    ReportDefinition {
        title: "8. Pesanan Belum Dibayar",
        query: "SELECT o.pesanan_id, u_pel.nama AS pelanggan, u_drv.nama AS driver, o.biaya \
                FROM orders o \
                JOIN users u_pel ON u_pel.user_id = o.pelanggan_id \
                JOIN drivers d ON d.driver_id = o.driver_id \
                JOIN users u_drv ON u_drv.user_id = d.user_id \
                LEFT JOIN payments p ON p.pesanan_id = o.pesanan_id \
                WHERE p.payment_id IS NULL \
                ORDER BY o.pesanan_id DESC",
    },
    ReportDefinition {
        title: "9. Rekap Pesanan per Driver",
        query: "SELECT u_drv.nama AS driver, COUNT(*) AS total_pesanan, \
                SUM(o.biaya) AS total_biaya \
                FROM orders o \
                JOIN drivers d ON d.driver_id = o.driver_id \
                JOIN users u_drv ON u_drv.user_id = d.user_id \
                GROUP BY u_drv.nama \
                ORDER BY total_pesanan DESC",
    },
    ReportDefinition {
        title: "10. Rekap Pembayaran per Metode",
        query: "SELECT metode, COUNT(*) AS jumlah_transaksi, SUM(jumlah) AS total_pembayaran \
                FROM payments \
                GROUP BY metode \
                ORDER BY total_pembayaran DESC",
    },
];
