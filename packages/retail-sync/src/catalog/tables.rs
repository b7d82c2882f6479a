//! Target tables. Mutable subsets mirror what a later load may overwrite;
//! every other column keeps the value of the first load.

use crate::types::table::{ColumnDefault as D, ColumnSpec as C, ForeignRef, TableSpec, WHOLE_RECORD};

pub static STORES: TableSpec = TableSpec {
    name: "stores",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_register"),
        C::text("_app"),
        C::text("name").mutable(),
        C::text("shortname"),
        C::text("address").mutable(),
        C::text("description"),
        C::text("type").or(D::Text("store")),
        C::boolean("default").or(D::Bool(false)),
        C::boolean("include").or(D::Bool(true)),
        C::json("balance").or(D::EmptyObject).mutable(),
        C::json("bank_details").or(D::EmptyArray),
        C::json("taxes").or(D::EmptyArray),
        C::json("info").or(D::EmptyObject),
        C::json("_stat_docs").or(D::EmptyObject),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[],
};

pub static ACCOUNTS: TableSpec = TableSpec {
    name: "accounts",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_app"),
        C::text("name").mutable(),
        C::text("type"),
        C::json("balance").or(D::EmptyObject).mutable(),
        C::json("bank_details").or(D::EmptyArray),
        C::boolean("include").or(D::Bool(true)),
        C::boolean("use_terminal").or(D::Bool(false)),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[],
};

pub static MONEY_SOURCES: TableSpec = TableSpec {
    name: "money_sources",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("id"),
        C::text("title").mutable(),
        C::text("type").mutable(),
        C::text("country"),
    ],
    references: &[],
};

pub static CATEGORIES: TableSpec = TableSpec {
    name: "categories",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("_client").or(D::Tenant),
        C::text("name").mutable(),
        C::bigint("sort_order"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[],
};

pub static SUPPLIERS: TableSpec = TableSpec {
    name: "suppliers",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_app"),
        C::text("name").or(D::Text("Unknown")).mutable(),
        C::text("site"),
        C::json("address"),
        C::text("description"),
        C::json("phones").or(D::EmptyArray).mutable(),
        C::json("emails").or(D::EmptyArray).mutable(),
        C::json("bank_details").or(D::EmptyArray),
        C::json("details").or(D::EmptyObject),
        C::numeric("debt").or(D::Zero).mutable(),
        C::numeric("rdebt").or(D::Zero),
        C::boolean("default").or(D::Bool(false)),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[],
};

/// Shared shape of the small master resources that carry no dedicated columns.
const MASTER_COLUMNS: &[C] = &[
    C::text("_id"),
    C::text("uuid"),
    C::text("_user"),
    C::text("_client").or(D::Tenant),
    C::text("_app"),
    C::text("name").mutable(),
    C::text("type"),
    C::json("document").from_field(WHOLE_RECORD).mutable(),
    C::bigint("created"),
    C::bigint("updated").mutable(),
    C::bigint("created_ms"),
    C::boolean("deleted").or(D::Bool(false)).mutable(),
];

pub static UNITS: TableSpec = TableSpec {
    name: "units",
    primary_key: "_id",
    columns: MASTER_COLUMNS,
    references: &[],
};

pub static TAGS: TableSpec = TableSpec {
    name: "tags",
    primary_key: "_id",
    columns: MASTER_COLUMNS,
    references: &[],
};

pub static TAXES: TableSpec = TableSpec {
    name: "taxes",
    primary_key: "_id",
    columns: MASTER_COLUMNS,
    references: &[],
};

pub static EMPLOYEES: TableSpec = TableSpec {
    name: "employees",
    primary_key: "_id",
    columns: MASTER_COLUMNS,
    references: &[],
};

pub static PRODUCTS: TableSpec = TableSpec {
    name: "products",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_app"),
        C::text("name").or(D::Text("")).mutable(),
        C::text("sku"),
        C::text("barcode"),
        C::text("code"),
        C::text("type").or(D::Text("inventory")),
        C::numeric("price").or(D::Zero).mutable(),
        C::numeric("cost").or(D::Zero).mutable(),
        C::numeric("purchase").or(D::Zero),
        C::numeric("discount").or(D::Zero),
        C::numeric("total_stock").or(D::Zero).mutable(),
        C::json("stock").or(D::EmptyObject).mutable(),
        C::json("_stock").or(D::EmptyArray),
        C::json("store_prices").or(D::EmptyObject),
        C::json("_store_prices").or(D::EmptyArray),
        C::json("categories").or(D::EmptyArray),
        C::text("unit"),
        C::text("country"),
        C::text("supplier"),
        C::text("description"),
        C::text("pic"),
        C::json("taxes").or(D::EmptyArray),
        C::boolean("tax_free").or(D::Bool(false)),
        C::boolean("free_price").or(D::Bool(false)),
        C::boolean("is_weighed").or(D::Bool(false)),
        C::json("component").or(D::EmptyArray),
        C::json("container").or(D::EmptyArray),
        C::json("imported"),
        C::text("id_group"),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[],
};

pub static CUSTOMERS: TableSpec = TableSpec {
    name: "customers",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_app"),
        C::text("name").or(D::Text("Unknown")).mutable(),
        C::text("type").or(D::Text("person")),
        C::text("sex"),
        C::text("description"),
        C::json("address"),
        C::json("phones").or(D::EmptyArray).mutable(),
        C::json("emails").or(D::EmptyArray).mutable(),
        C::json("bank_details").or(D::EmptyArray),
        C::json("details").or(D::EmptyArray),
        C::numeric("discount").or(D::Zero),
        C::text("discount_card"),
        C::text("loyalty_type"),
        C::numeric("cashback_rate").or(D::Zero),
        C::numeric("bonus_balance").or(D::Zero),
        C::numeric("bonus_spent").or(D::Zero),
        C::numeric("debt").or(D::Zero).mutable(),
        C::boolean("enable_savings").or(D::Bool(false)),
        C::text("bday"),
        C::boolean("default").or(D::Bool(false)),
        C::json("info").or(D::EmptyObject),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[],
};

pub static DOCUMENTS: TableSpec = TableSpec {
    name: "documents",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_shift"),
        C::text("_app"),
        C::text("type").or(D::Text("sale")),
        C::text("number"),
        C::boolean("status").or(D::Bool(true)).mutable(),
        C::bigint("date"),
        C::text("store"),
        C::json("from").or(D::EmptyObject),
        C::json("to").or(D::EmptyObject),
        C::numeric("sum").or(D::Zero).mutable(),
        C::numeric("paid").or(D::Zero).mutable(),
        C::numeric("discount_percent").or(D::Zero),
        C::numeric("discount_sum").or(D::Zero),
        C::numeric("tax_total").or(D::Zero),
        C::json("products").or(D::EmptyArray),
        C::json("payments").or(D::EmptyArray),
        C::text("notes"),
        C::text("comment"),
        C::json("info").or(D::EmptyObject),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[ForeignRef {
        column: "store",
        resource: "stores",
        key: "_id",
    }],
};

pub static MONEY_MOVEMENTS: TableSpec = TableSpec {
    name: "money_movements",
    primary_key: "_id",
    columns: &[
        C::text("_id"),
        C::text("uuid"),
        C::text("_user"),
        C::text("_client").or(D::Tenant),
        C::text("_document"),
        C::text("_shift"),
        C::text("_app"),
        C::text("type").or(D::Text("debit")),
        C::numeric("sum").or(D::Zero).mutable(),
        C::bigint("date"),
        C::json("from").or(D::EmptyObject),
        C::json("to").or(D::EmptyObject),
        C::text("account"),
        C::json("source").or(D::EmptyObject),
        C::text("reason"),
        C::text("description"),
        C::text("comment"),
        C::json("info").or(D::EmptyObject),
        C::bigint("created"),
        C::bigint("updated").mutable(),
        C::bigint("created_ms"),
        C::boolean("deleted").or(D::Bool(false)),
    ],
    references: &[ForeignRef {
        column: "account",
        resource: "accounts",
        key: "_id",
    }],
};
